//! Typed access to the shared control block.
//!
//! The block has no lock. Correctness rests on each word having exactly one
//! writer, and the two views below encode that split:
//!
//! | Words | Writer | Reader |
//! |-------|--------|--------|
//! | `eyecatcher`, `flags`, `ema_pow`, `enc.*`, `threshold`, `delay`, `cap_delay` | [`HostView`] | [`CoreView`] |
//! | `timer`, `ain_ema`, every other `enc_local` word | [`CoreView`] | [`HostView`] |
//!
//! Host reads of core-owned words are best-effort snapshots: a group such as
//! `min`/`max` may be observed mid-update. `ticks` and `speed` are single
//! words and are always read whole.

use core::sync::atomic::Ordering;

use crate::consts::{
    ENCODER_DISABLED, EYECATCHER, INITIAL_ACC_VAL, NUM_CHANNELS, NUM_ENCODERS,
};
use crate::error::BlockError;

use super::block::{EncLocal, SharedBlock};
use super::encoder::{EncoderState, HalfCycle};
use super::flags::CaptureFlags;
use super::snapshot::{BlockSnapshot, EncoderSnapshot};

/// Host configuration of one encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Analog channel, `None` = disabled.
    pub pin: Option<u8>,
    /// Minimum swing to confirm a tick.
    pub threshold: u32,
    /// Minimum timer units between confirmed ticks.
    pub delay: u32,
}

impl EncoderSettings {
    /// A disabled encoder.
    pub const DISABLED: Self = Self {
        pin: None,
        threshold: 0,
        delay: 0,
    };
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Everything the host writes before starting the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockSettings {
    /// EMA exponent.
    pub ema_pow: u32,
    /// Extra delay per iteration in microseconds.
    pub cap_delay: u32,
    /// Encoder configuration, indexed by encoder number.
    pub encoders: [EncoderSettings; NUM_ENCODERS],
}

#[inline]
fn pin_to_byte(pin: Option<u8>) -> u8 {
    pin.unwrap_or(ENCODER_DISABLED)
}

#[inline]
fn byte_to_channel(byte: u8) -> Option<usize> {
    let channel = byte as usize;
    (channel < NUM_CHANNELS).then_some(channel)
}

/// Pin byte of `encoder`. Panics when `encoder >= NUM_ENCODERS`, like the
/// `enc_local` accessors.
fn pin_word(block: &SharedBlock, encoder: usize) -> &core::sync::atomic::AtomicU8 {
    [&block.enc.encoder0, &block.enc.encoder1][encoder]
}

// ─── Host View ──────────────────────────────────────────────────────

/// Host side of the block: writes configuration and flags, reads live state.
///
/// Per-encoder methods panic when `encoder >= NUM_ENCODERS`.
#[derive(Debug, Clone, Copy)]
pub struct HostView<'a> {
    block: &'a SharedBlock,
}

impl<'a> HostView<'a> {
    /// Wrap a block.
    pub const fn new(block: &'a SharedBlock) -> Self {
        Self { block }
    }

    /// Reset the block and write a fresh configuration.
    ///
    /// Must only be called while the core is not running. The eyecatcher is
    /// cleared first and published last with release ordering, so a reader
    /// that sees a valid eyecatcher also sees the initialized block.
    pub fn initialize(&self, settings: &BlockSettings) {
        let b = self.block;
        b.eyecatcher.store(0, Ordering::Release);

        b.timer.store(0, Ordering::Relaxed);
        b.flags.store(0, Ordering::Relaxed);
        b.scope.addr.store(0, Ordering::Relaxed);
        b.scope.offset.store(0, Ordering::Relaxed);
        b.scope.length.store(0, Ordering::Relaxed);
        b.reserved0.store(0, Ordering::Relaxed);
        b.ema_pow.store(settings.ema_pow, Ordering::Relaxed);
        for word in &b.ain_ema {
            word.store(0, Ordering::Relaxed);
        }
        for byte in &b.enc.reserved {
            byte.store(0, Ordering::Relaxed);
        }

        for (idx, enc) in settings.encoders.iter().enumerate() {
            pin_word(b, idx).store(pin_to_byte(enc.pin), Ordering::Relaxed);
            reset_local(&b.enc_local[idx], enc.threshold, enc.delay);
        }

        b.cap_delay.store(settings.cap_delay, Ordering::Relaxed);
        b.eyecatcher.store(EYECATCHER, Ordering::Release);
    }

    /// Check the eyecatcher before trusting any other word.
    pub fn verify(&self) -> Result<(), BlockError> {
        let found = self.block.eyecatcher.load(Ordering::Acquire);
        if found != EYECATCHER {
            return Err(BlockError::BadEyecatcher {
                found,
                expected: EYECATCHER,
            });
        }
        Ok(())
    }

    // ── Configuration writes ──

    /// Set the EMA exponent.
    pub fn set_ema_pow(&self, ema_pow: u32) {
        self.block.ema_pow.store(ema_pow, Ordering::Relaxed);
    }

    /// Assign (or disable) an encoder channel.
    pub fn set_encoder_pin(&self, encoder: usize, pin: Option<u8>) {
        pin_word(self.block, encoder).store(pin_to_byte(pin), Ordering::Relaxed);
    }

    /// Set an encoder's tick threshold.
    pub fn set_threshold(&self, encoder: usize, threshold: u32) {
        self.block.enc_local[encoder]
            .threshold
            .store(threshold, Ordering::Relaxed);
    }

    /// Set an encoder's debounce delay.
    pub fn set_delay(&self, encoder: usize, delay: u32) {
        self.block.enc_local[encoder]
            .delay
            .store(delay, Ordering::Relaxed);
    }

    /// Set the extra per-iteration delay.
    pub fn set_cap_delay(&self, cap_delay: u32) {
        self.block.cap_delay.store(cap_delay, Ordering::Relaxed);
    }

    /// Ask the core to leave its loop after the current iteration.
    pub fn request_stop(&self) {
        self.block
            .flags
            .fetch_or(CaptureFlags::STOP.bits(), Ordering::Release);
    }

    /// Clear all flags. Only meaningful before the next start.
    pub fn clear_flags(&self) {
        self.block.flags.store(0, Ordering::Release);
    }

    // ── Reads ──

    /// Current flags.
    pub fn flags(&self) -> CaptureFlags {
        CaptureFlags::from_bits_retain(self.block.flags.load(Ordering::Acquire))
    }

    /// Iterations performed so far.
    pub fn timer(&self) -> u32 {
        self.block.timer.load(Ordering::Relaxed)
    }

    /// EMA exponent currently configured.
    pub fn ema_pow(&self) -> u32 {
        self.block.ema_pow.load(Ordering::Relaxed)
    }

    /// Extra per-iteration delay currently configured.
    pub fn cap_delay(&self) -> u32 {
        self.block.cap_delay.load(Ordering::Relaxed)
    }

    /// EMA value of one channel.
    pub fn value(&self, channel: usize) -> u32 {
        self.block.ain_ema[channel].load(Ordering::Relaxed)
    }

    /// EMA values of all channels.
    pub fn values(&self) -> [u32; NUM_CHANNELS] {
        core::array::from_fn(|ch| self.value(ch))
    }

    /// Channel assigned to an encoder, `None` if disabled.
    pub fn encoder_pin(&self, encoder: usize) -> Option<u8> {
        let byte = pin_word(self.block, encoder).load(Ordering::Relaxed);
        byte_to_channel(byte).map(|ch| ch as u8)
    }

    /// Configured threshold of an encoder.
    pub fn threshold(&self, encoder: usize) -> u32 {
        self.block.enc_local[encoder].threshold.load(Ordering::Relaxed)
    }

    /// Configured debounce delay of an encoder.
    pub fn delay(&self, encoder: usize) -> u32 {
        self.block.enc_local[encoder].delay.load(Ordering::Relaxed)
    }

    /// Confirmed ticks of an encoder.
    pub fn ticks(&self, encoder: usize) -> u32 {
        self.block.enc_local[encoder].ticks.load(Ordering::Relaxed)
    }

    /// Last half-cycle width of an encoder, `None` before the first edge.
    pub fn speed(&self, encoder: usize) -> Option<u32> {
        let speed = self.block.enc_local[encoder].speed.load(Ordering::Relaxed);
        (speed != INITIAL_ACC_VAL).then_some(speed)
    }

    /// Best-effort snapshot of one encoder's live words.
    pub fn encoder(&self, encoder: usize) -> EncoderSnapshot {
        let local = &self.block.enc_local[encoder];
        EncoderSnapshot {
            raw: local.raw.load(Ordering::Relaxed),
            min: local.min.load(Ordering::Relaxed),
            max: local.max.load(Ordering::Relaxed),
            ticks: local.ticks.load(Ordering::Relaxed),
            speed: self.speed(encoder),
        }
    }

    /// Best-effort snapshot of the whole block.
    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            timer: self.timer(),
            values: self.values(),
            encoders: core::array::from_fn(|idx| {
                self.encoder_pin(idx).map(|_| self.encoder(idx))
            }),
        }
    }
}

fn reset_local(local: &EncLocal, threshold: u32, delay: u32) {
    let fresh = EncoderState::new(threshold, delay);
    local.threshold.store(fresh.threshold, Ordering::Relaxed);
    local.delay.store(fresh.delay, Ordering::Relaxed);
    local.raw.store(fresh.raw, Ordering::Relaxed);
    local.min.store(fresh.min, Ordering::Relaxed);
    local.max.store(fresh.max, Ordering::Relaxed);
    local.ticks.store(fresh.ticks, Ordering::Relaxed);
    local.speed.store(fresh.speed, Ordering::Relaxed);
    local.acc.store(fresh.acc, Ordering::Relaxed);
    local.uptick_time.store(fresh.uptick_time, Ordering::Relaxed);
    local.downtick_time.store(fresh.downtick_time, Ordering::Relaxed);
    local.phase.store(fresh.phase.as_word(), Ordering::Relaxed);
    for word in &local.reserved {
        word.store(0, Ordering::Relaxed);
    }
}

// ─── Core View ──────────────────────────────────────────────────────

/// Core side of the block: writes live state, reads configuration and flags.
#[derive(Debug, Clone, Copy)]
pub struct CoreView<'a> {
    block: &'a SharedBlock,
}

impl<'a> CoreView<'a> {
    /// Wrap a block.
    pub const fn new(block: &'a SharedBlock) -> Self {
        Self { block }
    }

    /// Iterations performed so far.
    #[inline]
    pub fn timer(&self) -> u32 {
        self.block.timer.load(Ordering::Relaxed)
    }

    /// Advance the iteration counter by one (wrapping) and return it.
    #[inline]
    pub fn advance_timer(&self) -> u32 {
        let next = self.timer().wrapping_add(1);
        self.block.timer.store(next, Ordering::Relaxed);
        next
    }

    /// EMA exponent.
    #[inline]
    pub fn ema_pow(&self) -> u32 {
        self.block.ema_pow.load(Ordering::Relaxed)
    }

    /// Extra per-iteration delay in microseconds.
    #[inline]
    pub fn cap_delay(&self) -> u32 {
        self.block.cap_delay.load(Ordering::Relaxed)
    }

    /// EMA value of one channel.
    #[inline]
    pub fn ain_ema(&self, channel: usize) -> u32 {
        self.block.ain_ema[channel].load(Ordering::Relaxed)
    }

    /// Publish the EMA value of one channel.
    #[inline]
    pub fn set_ain_ema(&self, channel: usize, value: u32) {
        self.block.ain_ema[channel].store(value, Ordering::Relaxed);
    }

    /// Channel feeding an encoder. Bytes outside `0..NUM_CHANNELS` read as
    /// disabled.
    #[inline]
    pub fn encoder_channel(&self, encoder: usize) -> Option<usize> {
        byte_to_channel(pin_word(self.block, encoder).load(Ordering::Relaxed))
    }

    /// Load an encoder's working state.
    #[inline]
    pub fn load_encoder(&self, encoder: usize) -> EncoderState {
        let local = &self.block.enc_local[encoder];
        EncoderState {
            threshold: local.threshold.load(Ordering::Relaxed),
            delay: local.delay.load(Ordering::Relaxed),
            raw: local.raw.load(Ordering::Relaxed),
            min: local.min.load(Ordering::Relaxed),
            max: local.max.load(Ordering::Relaxed),
            ticks: local.ticks.load(Ordering::Relaxed),
            speed: local.speed.load(Ordering::Relaxed),
            acc: local.acc.load(Ordering::Relaxed),
            uptick_time: local.uptick_time.load(Ordering::Relaxed),
            downtick_time: local.downtick_time.load(Ordering::Relaxed),
            phase: HalfCycle::from_word(local.phase.load(Ordering::Relaxed)),
        }
    }

    /// Store the core-owned words of an encoder. `threshold` and `delay`
    /// belong to the host and are left untouched.
    #[inline]
    pub fn store_encoder(&self, encoder: usize, state: &EncoderState) {
        let local = &self.block.enc_local[encoder];
        local.raw.store(state.raw, Ordering::Relaxed);
        local.min.store(state.min, Ordering::Relaxed);
        local.max.store(state.max, Ordering::Relaxed);
        local.ticks.store(state.ticks, Ordering::Relaxed);
        local.speed.store(state.speed, Ordering::Relaxed);
        local.acc.store(state.acc, Ordering::Relaxed);
        local.uptick_time.store(state.uptick_time, Ordering::Relaxed);
        local.downtick_time.store(state.downtick_time, Ordering::Relaxed);
        local.phase.store(state.phase.as_word(), Ordering::Relaxed);
    }

    /// Poll the stop bit.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        CaptureFlags::from_bits_retain(self.block.flags.load(Ordering::Acquire))
            .stop_requested()
    }
}
