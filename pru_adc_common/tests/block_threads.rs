//! Host and core views used from two threads at once.
//!
//! The block carries no lock; these tests check that the single-writer split
//! holds up when a writer thread and a reader thread share one block.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use pru_adc_common::prelude::*;

fn settings() -> BlockSettings {
    BlockSettings {
        ema_pow: 0,
        cap_delay: 0,
        encoders: [
            EncoderSettings {
                pin: Some(2),
                threshold: 100,
                delay: 1,
            },
            EncoderSettings::DISABLED,
        ],
    }
}

#[test]
fn host_observes_monotonic_timer_and_ticks() {
    let block = Arc::new(SharedBlock::new());
    HostView::new(&block).initialize(&settings());

    let writer = {
        let block = Arc::clone(&block);
        thread::spawn(move || {
            let core = CoreView::new(&block);
            while !core.stop_requested() {
                let timer = core.advance_timer();
                let mut state = core.load_encoder(0);
                state.ticks = state.ticks.wrapping_add(1);
                state.speed = timer % 1000;
                core.store_encoder(0, &state);
                if timer >= 50_000 {
                    break;
                }
            }
            core.timer()
        })
    };

    let host = HostView::new(&block);
    let mut last_timer = 0;
    let mut last_ticks = 0;
    for _ in 0..10_000 {
        let timer = host.timer();
        let ticks = host.ticks(0);
        assert!(timer >= last_timer);
        assert!(ticks >= last_ticks);
        last_timer = timer;
        last_ticks = ticks;
    }
    host.request_stop();

    let final_timer = writer.join().unwrap();
    assert_eq!(host.timer(), final_timer);
    assert_eq!(host.ticks(0), final_timer);
    // host-owned words are never touched by the core side
    assert_eq!(host.threshold(0), 100);
    assert_eq!(host.delay(0), 1);
}

#[test]
fn stop_request_crosses_threads() {
    let block = Arc::new(SharedBlock::new());
    HostView::new(&block).initialize(&settings());
    let started = Arc::new(AtomicBool::new(false));

    let worker = {
        let block = Arc::clone(&block);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            let core = CoreView::new(&block);
            started.store(true, Ordering::Release);
            let mut spins = 0u64;
            while !core.stop_requested() {
                core.advance_timer();
                spins += 1;
                thread::yield_now();
            }
            spins
        })
    };

    while !started.load(Ordering::Acquire) {
        thread::yield_now();
    }
    HostView::new(&block).request_stop();
    let spins = worker.join().unwrap();
    assert_eq!(u64::from(HostView::new(&block).timer()), spins);
}
