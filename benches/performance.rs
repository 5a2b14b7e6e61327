// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for SMFBRIDGE
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Variable-length quantity encoding and decoding
//! - Byte stream reassembly throughput
//! - SMF track writing and reading

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smfbridge::midi::{EventAssembler, MidiEvent, PacketDecoder};
use smfbridge::smf::{varlen, SmfReader, SmfWriter};
use smfbridge::timing::{Tempo, TickConverter};
use std::io::Cursor;

/// Benchmark variable-length quantity encoding (MIDI file core)
fn bench_varlen(c: &mut Criterion) {
    let mut group = c.benchmark_group("varlen");

    for value in [0u32, 127, 128, 16383, 2097151, varlen::MAX_VALUE].iter() {
        group.bench_with_input(BenchmarkId::new("encode", value), value, |b, &value| {
            b.iter(|| varlen::encode(black_box(value)))
        });

        let bytes = varlen::encode(*value);
        group.bench_with_input(BenchmarkId::new("decode", value), &bytes, |b, bytes| {
            b.iter(|| varlen::decode(&mut Cursor::new(black_box(bytes.as_slice()))))
        });
    }

    group.finish();
}

/// Benchmark tick conversion in both directions
fn bench_tick_conversion(c: &mut Criterion) {
    let converter = TickConverter::new(480, Tempo::from_bpm(120.0));

    c.bench_function("millis_to_ticks", |b| {
        b.iter(|| converter.millis_to_ticks(black_box(1234)))
    });
    c.bench_function("ticks_to_duration", |b| {
        b.iter(|| converter.ticks_to_duration(black_box(1184)))
    });
}

fn running_status_stream(events: usize) -> Vec<u8> {
    let mut bytes = vec![0x90];
    for i in 0..events {
        bytes.push((i % 128) as u8);
        bytes.push(if i % 2 == 0 { 100 } else { 0 });
        if i % 64 == 0 {
            bytes.push(0xF8); // clock byte mixed in
        }
    }
    bytes
}

/// Benchmark reassembly of raw transport bytes into events
fn bench_assembler(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembler");

    for size in [100, 1000, 10000].iter() {
        let stream = running_status_stream(*size);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("serial", size), &stream, |b, stream| {
            let mut out = Vec::with_capacity(*size);
            b.iter(|| {
                out.clear();
                let mut assembler = EventAssembler::new();
                assembler.feed(black_box(stream), &mut out);
                black_box(out.len())
            })
        });

        let packets: Vec<u8> = (0..*size)
            .flat_map(|i| MidiEvent::note_on((i % 16) as u8, (i % 128) as u8, 100).to_usb_packet())
            .collect();
        group.throughput(Throughput::Bytes(packets.len() as u64));
        group.bench_with_input(BenchmarkId::new("usb_packet", size), &packets, |b, packets| {
            let mut out = Vec::with_capacity(*size);
            b.iter(|| {
                out.clear();
                let mut decoder = PacketDecoder::new();
                decoder.feed(black_box(packets), &mut out);
                black_box(out.len())
            })
        });
    }

    group.finish();
}

fn write_track(events: usize) -> Vec<u8> {
    let mut writer = SmfWriter::begin(Cursor::new(Vec::new()), 480).unwrap();
    writer.write_tempo(0, 500_000).unwrap();
    for i in 0..events {
        let event = if i % 2 == 0 {
            MidiEvent::note_on(0, (i % 128) as u8, 100)
        } else {
            MidiEvent::note_off(0, (i % 128) as u8, 0)
        };
        writer.write_timed_event((i % 500) as u32, &event).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Benchmark SMF track writing and reading
fn bench_smf(c: &mut Criterion) {
    let mut group = c.benchmark_group("smf");

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("write", size), size, |b, &size| {
            b.iter(|| black_box(write_track(size)))
        });

        let bytes = write_track(*size);
        group.bench_with_input(BenchmarkId::new("read", size), &bytes, |b, bytes| {
            b.iter(|| {
                let reader = SmfReader::open(Cursor::new(black_box(bytes.as_slice()))).unwrap();
                black_box(reader.filter(|event| event.is_ok()).count())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_varlen,
    bench_tick_conversion,
    bench_assembler,
    bench_smf,
);

criterion_main!(benches);
