use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dialwatch::audio::{AudioWindower, WindowConfig};
use dialwatch::dtmf::goertzel::GoertzelBank;
use dialwatch::dtmf::synth::white_noise;
use dialwatch::dtmf::table::{HIGH_GROUP_HZ, LOW_GROUP_HZ};
use dialwatch::dtmf::{DetectorConfig, ToneDetector, ToneSynth};
use dialwatch::pipeline::{AudioWindow, DetectionStation};
use dialwatch::Config;
use std::hint::black_box;
use std::time::{Duration, SystemTime};

const RATE: u32 = 8000;

fn windows(samples: &[i16]) -> Vec<AudioWindow> {
    AudioWindower::new(WindowConfig::default(), SystemTime::UNIX_EPOCH).push(samples)
}

fn bench_goertzel_bank(c: &mut Criterion) {
    let window = ToneSynth::new(RATE).symbol('5', 205).unwrap_or_default();
    let samples: Vec<f32> = window.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
    let low = GoertzelBank::new(LOW_GROUP_HZ, RATE);
    let high = GoertzelBank::new(HIGH_GROUP_HZ, RATE);

    c.bench_function("goertzel_bank_8_bins", |b| {
        b.iter(|| {
            let l = low.magnitudes(black_box(&samples));
            let h = high.magnitudes(black_box(&samples));
            black_box((l, h))
        })
    });
}

fn bench_detector(c: &mut Criterion) {
    let tone = ToneSynth::new(RATE)
        .sequence("5", Duration::from_millis(200), Duration::ZERO)
        .unwrap_or_default();
    let noise = white_noise(1600, 0.3, 11);

    let mut group = c.benchmark_group("tone_detector");
    for (name, samples) in [("tone", tone), ("noise", noise), ("silence", vec![0i16; 1600])] {
        let input = windows(&samples);
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            let mut detector = ToneDetector::new(DetectorConfig::default());
            b.iter(|| {
                for window in input {
                    black_box(detector.detect(black_box(window)));
                }
            })
        });
    }
    group.finish();
}

/// One second of a dial-out through detector, debouncer and aggregator.
fn bench_detection_station(c: &mut Criterion) {
    let mut samples = ToneSynth::new(RATE)
        .sequence("1234181131", Duration::from_millis(50), Duration::from_millis(50))
        .unwrap_or_default();
    samples.resize(RATE as usize, 0);
    let input = windows(&samples);
    let config = Config::default();

    c.bench_function("detection_station_one_second", |b| {
        b.iter(|| {
            let mut station = DetectionStation::from_config(&config);
            for window in &input {
                black_box(station.step(window).ok());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_goertzel_bank,
    bench_detector,
    bench_detection_station
);
criterion_main!(benches);
