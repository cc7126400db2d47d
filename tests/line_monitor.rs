//! Synthetic phone-line audio through the threaded monitor.

use dialwatch::audio::MockAudioSource;
use dialwatch::delivery::{
    DeliveryConfig, DeliveryEvent, DeliveryManager, DeliveryState, ScriptedNotifier,
};
use dialwatch::dtmf::ToneSynth;
use dialwatch::dtmf::synth::white_noise;
use dialwatch::error::DeliveryError;
use dialwatch::pipeline::{CollectorSink, DeliverySink, Monitor, MonitorConfig};
use dialwatch::{DialwatchError, TriggerEvent};
use std::sync::Arc;
use std::time::Duration;

const RATE: u32 = 8000;

fn tone(symbols: &str, tone_ms: u64, gap_ms: u64) -> Vec<i16> {
    ToneSynth::new(RATE)
        .sequence(
            symbols,
            Duration::from_millis(tone_ms),
            Duration::from_millis(gap_ms),
        )
        .unwrap()
}

fn silence(ms: u64) -> Vec<i16> {
    vec![0i16; (RATE as u64 * ms / 1000) as usize]
}

fn run_collect(samples: &[i16], config: MonitorConfig) -> Vec<TriggerEvent> {
    let source = MockAudioSource::new(RATE).with_samples(samples, 160);
    let handle = Monitor::new(config)
        .start(Box::new(source), Box::new(CollectorSink::new()))
        .unwrap();
    handle.wait().unwrap().triggers
}

#[test]
fn single_burst_then_silence_raises_one_alarm() {
    let mut samples = tone("5", 150, 0);
    samples.extend(silence(500));

    let triggers = run_collect(&samples, MonitorConfig::default());

    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].id, 1);
    assert_eq!(triggers[0].symbol, '5');
    assert!(triggers[0].detected_at < Duration::from_millis(150));
}

#[test]
fn panel_report_sequence_is_one_alarm() {
    // Contact-ID style: account, event code, checksum, dialled in one burst.
    let mut samples = silence(300);
    samples.extend(tone("1234 18 1131 01 001 7", 60, 60));
    samples.extend(silence(300));

    let triggers = run_collect(&samples, MonitorConfig::default());

    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].symbol, '1');
}

#[test]
fn noise_and_speech_like_audio_raise_nothing() {
    let mut samples = white_noise(RATE as usize * 2, 0.3, 7);
    samples.extend(ToneSynth::new(RATE).sine(&[440.0, 350.0], RATE as usize));

    let triggers = run_collect(&samples, MonitorConfig::default());

    assert!(triggers.is_empty(), "unexpected triggers: {triggers:?}");
}

#[test]
fn second_dial_out_after_cooldown_is_a_new_alarm() {
    let mut config = MonitorConfig::default();
    config.trigger.cooldown = Duration::from_secs(1);

    let mut samples = tone("9", 100, 0);
    samples.extend(silence(2000));
    samples.extend(tone("9", 100, 0));
    samples.extend(silence(200));

    let triggers = run_collect(&samples, config);

    let ids: Vec<u64> = triggers.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(triggers[1].detected_at > triggers[0].detected_at + Duration::from_secs(1));
}

#[test]
fn source_loss_ends_the_monitor_with_an_error() {
    let source = MockAudioSource::new(RATE)
        .with_samples(&tone("1", 200, 200), 160)
        .with_loss_after(4)
        .with_error_message("modem went away");
    let handle = Monitor::new(MonitorConfig::default())
        .start(Box::new(source), Box::new(CollectorSink::new()))
        .unwrap();

    match handle.wait() {
        Err(DialwatchError::AudioSourceLost { message }) => {
            assert!(message.contains("modem went away"), "{message}")
        }
        other => panic!("expected source loss, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn detected_alarm_is_delivered_once() {
    let notifier = Arc::new(ScriptedNotifier::failing_times(
        2,
        DeliveryError::Status(503),
    ));
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let config = DeliveryConfig {
        retry_interval: Duration::from_millis(20),
        deadline: Duration::from_secs(5),
    };
    let manager = Arc::new(
        DeliveryManager::new(
            notifier.clone(),
            config,
            "integration",
            tokio::runtime::Handle::current(),
        )
        .with_event_sender(events_tx),
    );

    let mut samples = tone("5", 150, 0);
    samples.extend(silence(500));
    let source = MockAudioSource::new(RATE).with_samples(&samples, 160);
    let handle = Monitor::new(MonitorConfig::default())
        .start(
            Box::new(source),
            Box::new(DeliverySink::new(Arc::clone(&manager))),
        )
        .unwrap();
    let report = tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.triggers.len(), 1);

    manager.drain().await;

    let mut finished = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        if let DeliveryEvent::Finished {
            trigger_id,
            state,
            attempts,
        } = event
        {
            finished.push((trigger_id, state, attempts));
        }
    }
    assert_eq!(finished, vec![(1, DeliveryState::Succeeded, 3)]);

    let calls = notifier.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, payload)| payload.trigger_id == 1
        && payload.symbol == "5"
        && payload.source == "integration"));
}
