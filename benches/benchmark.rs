use criterion::{black_box, criterion_group, criterion_main, Criterion};

use packet_modem_core::afsk::{AfskConfig, AfskDemod};
use packet_modem_core::baseband::{BasebandConfig, BasebandDemod};
use packet_modem_core::config::{AfskProfile, ModulationOrder, PskProfile, V26Variant};
use packet_modem_core::psk::{PskConfig, PskDemod};

use std::f64::consts::TAU;

fn mixed_tone(n: usize, sample_rate_hz: f64) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate_hz;
            let freq = if (i / 37) % 2 == 0 { 1200.0 } else { 2200.0 };
            (TAU * freq * t).sin() as f32
        })
        .collect()
}

fn afsk_coherent_bench(samples: &[f32]) {
    let cfg = AfskConfig {
        profile: AfskProfile::Coherent,
        sample_rate_hz: 44100.0,
        baud: 1200.0,
        mark_freq_hz: 1200.0,
        space_freq_hz: 2200.0,
        num_slicers: 1,
        use_prefilter: true,
        clamp_oversized_filters: false,
    };
    let mut demod = AfskDemod::new(&cfg).unwrap();
    for &s in samples {
        black_box(demod.process_sample(s));
    }
}

fn afsk_fm_discriminator_bench(samples: &[f32]) {
    let cfg = AfskConfig {
        profile: AfskProfile::FmDiscriminator,
        sample_rate_hz: 44100.0,
        baud: 1200.0,
        mark_freq_hz: 1200.0,
        space_freq_hz: 2200.0,
        num_slicers: 3,
        use_prefilter: true,
        clamp_oversized_filters: false,
    };
    let mut demod = AfskDemod::new(&cfg).unwrap();
    for &s in samples {
        black_box(demod.process_sample(s));
    }
}

fn psk_bench(samples: &[f32]) {
    let cfg = PskConfig {
        profile: PskProfile::LocalOscillatorFiltered,
        order: ModulationOrder::Four,
        v26_variant: V26Variant::B,
        sample_rate_hz: 44100.0,
        baud: 1200.0,
        carrier_hz: 1800.0,
        clamp_oversized_filters: false,
    };
    let mut demod = PskDemod::new(&cfg).unwrap();
    for &s in samples {
        black_box(demod.process_sample(s));
    }
}

fn baseband_bench(samples: &[f32]) {
    let cfg = BasebandConfig {
        sample_rate_hz: 48000.0,
        baud: 9600.0,
        upsample: 2,
        descramble: true,
        num_slicers: 1,
        clamp_oversized_filters: false,
    };
    let mut demod = BasebandDemod::new(&cfg).unwrap();
    for &s in samples {
        black_box(demod.process_sample(s));
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let one_second_44k = mixed_tone(44100, 44100.0);
    let one_second_48k = mixed_tone(48000, 48000.0);

    c.bench_function("afsk_coherent_1s", |b| {
        b.iter(|| afsk_coherent_bench(black_box(&one_second_44k)))
    });
    c.bench_function("afsk_fm_discriminator_multi_slicer_1s", |b| {
        b.iter(|| afsk_fm_discriminator_bench(black_box(&one_second_44k)))
    });
    c.bench_function("psk_qpsk_local_oscillator_filtered_1s", |b| {
        b.iter(|| psk_bench(black_box(&one_second_44k)))
    });
    c.bench_function("baseband_g3ruh_scrambled_1s", |b| {
        b.iter(|| baseband_bench(black_box(&one_second_48k)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
