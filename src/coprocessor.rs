//! RF co-processor boundary.
//!
//! The co-processor is a separately flashed image that runs as its own task
//! and talks to us only through a handful of flags in a shared area. Its
//! internals are opaque; this module sets, clears and polls the flags at the
//! documented points and bounds every wait on it.

use core::ops::BitOr;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_time::{Duration, Instant, Timer};

/// Value of an erased flash word: no image at the handshake address.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoprocessorFlags(u8);

impl CoprocessorFlags {
    pub const EMPTY: Self = Self(0);
    /// We asked for a model save; cleared by the co-processor when done.
    pub const SAVE_PENDING: Self = Self(1 << 0);
    /// Co-processor is about to take over for a firmware update.
    pub const SHOW_BOOT_ICON: Self = Self(1 << 1);
    /// Model id still has to be pushed to the co-processor.
    pub const MODEL_ID_PENDING: Self = Self(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CoprocessorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

pub trait Coprocessor: Sync {
    fn is_present(&self) -> bool;
    /// Publishes the task flags so the image can run.
    fn start(&self);
    fn stop(&self);
    fn poll_flags(&self) -> CoprocessorFlags;
    fn set_flags(&self, flags: CoprocessorFlags);
    fn clear_flags(&self, flags: CoprocessorFlags);

    fn request_save(&self) {
        self.set_flags(CoprocessorFlags::SAVE_PENDING);
    }

    fn push_model_id(&self, id: u8);
    /// Model id the co-processor currently reports.
    fn model_id(&self) -> u8;
}

/// Board without a co-processor.
pub struct NoCoprocessor;

impl Coprocessor for NoCoprocessor {
    fn is_present(&self) -> bool {
        false
    }
    fn start(&self) {}
    fn stop(&self) {}
    fn poll_flags(&self) -> CoprocessorFlags {
        CoprocessorFlags::EMPTY
    }
    fn set_flags(&self, _flags: CoprocessorFlags) {}
    fn clear_flags(&self, _flags: CoprocessorFlags) {}
    fn push_model_id(&self, _id: u8) {}
    fn model_id(&self) -> u8 {
        0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveOutcome {
    Acknowledged,
    TimedOut,
}

/// Requests a model save and waits at most `timeout` for the co-processor
/// to clear the pending flag. Shutdown proceeds either way.
pub async fn save_handshake<C: Coprocessor + ?Sized>(
    coprocessor: &C,
    timeout: Duration,
    poll: Duration,
) -> SaveOutcome {
    coprocessor.request_save();
    let started = Instant::now();
    loop {
        if !coprocessor.poll_flags().contains(CoprocessorFlags::SAVE_PENDING) {
            debug!("co-processor save acknowledged");
            return SaveOutcome::Acknowledged;
        }
        if Instant::now().saturating_duration_since(started) > timeout {
            warn!("co-processor save not acknowledged, shutting down anyway");
            return SaveOutcome::TimedOut;
        }
        Timer::after(poll).await;
    }
}

/// Flag area shared with the co-processor image.
pub struct SharedArea {
    flags: AtomicU8,
    /// Written by the image.
    model_id: AtomicU8,
    /// Written by us, read by the image.
    requested_model_id: AtomicU8,
    running: AtomicBool,
}

impl SharedArea {
    pub const fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
            model_id: AtomicU8::new(0),
            requested_model_id: AtomicU8::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Image side: acknowledge flags.
    pub fn image_clear(&self, flags: CoprocessorFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Image side: raise flags.
    pub fn image_set(&self, flags: CoprocessorFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Image side: report the model id it has stored.
    pub fn image_report_model_id(&self, id: u8) {
        self.model_id.store(id, Ordering::Release);
    }

    pub fn requested_model_id(&self) -> u8 {
        self.requested_model_id.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for SharedArea {
    fn default() -> Self {
        Self::new()
    }
}

/// Co-processor found through the first word of its flash image.
pub struct HandshakeCoprocessor<'a> {
    entry: u32,
    shared: &'a SharedArea,
}

impl<'a> HandshakeCoprocessor<'a> {
    pub const fn new(entry_word: u32, shared: &'a SharedArea) -> Self {
        Self {
            entry: entry_word,
            shared,
        }
    }

    /// Reads the entry word at the image's fixed address.
    ///
    /// # Safety
    /// `addr` must be a readable, word aligned flash address.
    pub unsafe fn probe(addr: usize, shared: &'a SharedArea) -> Self {
        let entry = core::ptr::read_volatile(addr as *const u32);
        Self::new(entry, shared)
    }

    pub fn entry(&self) -> Option<u32> {
        (self.entry != ERASED_WORD).then_some(self.entry)
    }

    /// Runs one cooperative slice of the image. No-op without an image.
    ///
    /// # Safety
    /// The entry word must be the address of the image's step function,
    /// which takes the shared area and returns.
    pub unsafe fn step(&self) {
        if let Some(entry) = self.entry() {
            let step: extern "C" fn(*const SharedArea) = core::mem::transmute(entry as usize);
            step(self.shared);
        }
    }
}

impl Coprocessor for HandshakeCoprocessor<'_> {
    fn is_present(&self) -> bool {
        self.entry().is_some()
    }

    fn start(&self) {
        self.shared.flags.store(0, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);
        info!("co-processor image at {=u32:#x} started", self.entry);
    }

    fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    fn poll_flags(&self) -> CoprocessorFlags {
        CoprocessorFlags::from_bits(self.shared.flags.load(Ordering::Acquire))
    }

    fn set_flags(&self, flags: CoprocessorFlags) {
        self.shared.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    fn clear_flags(&self, flags: CoprocessorFlags) {
        self.shared.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    fn push_model_id(&self, id: u8) {
        self.shared.requested_model_id.store(id, Ordering::Release);
    }

    fn model_id(&self) -> u8 {
        self.shared.model_id.load(Ordering::Acquire)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use core::sync::atomic::AtomicU32;

    /// Co-processor stand-in. Acknowledges a save after `ack_after` polls
    /// (never when `None`) and adopts pushed model ids immediately.
    pub struct StubCoprocessor {
        pub present: bool,
        pub ack_after: Option<u32>,
        flags: AtomicU8,
        polls: AtomicU32,
        model: AtomicU8,
        pub started: AtomicBool,
        pub stopped: AtomicBool,
        pub pushes: AtomicU32,
    }

    impl StubCoprocessor {
        pub fn new(present: bool, ack_after: Option<u32>) -> Self {
            Self {
                present,
                ack_after,
                flags: AtomicU8::new(0),
                polls: AtomicU32::new(0),
                model: AtomicU8::new(0),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                pushes: AtomicU32::new(0),
            }
        }

        pub fn raise(&self, flags: CoprocessorFlags) {
            self.flags.fetch_or(flags.bits(), Ordering::SeqCst);
        }
    }

    impl Coprocessor for StubCoprocessor {
        fn is_present(&self) -> bool {
            self.present
        }
        fn start(&self) {
            self.started.store(true, Ordering::SeqCst);
        }
        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
        fn poll_flags(&self) -> CoprocessorFlags {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(n) = self.ack_after {
                if polls >= n {
                    self.flags
                        .fetch_and(!CoprocessorFlags::SAVE_PENDING.bits(), Ordering::SeqCst);
                }
            }
            CoprocessorFlags::from_bits(self.flags.load(Ordering::SeqCst))
        }
        fn set_flags(&self, flags: CoprocessorFlags) {
            self.polls.store(0, Ordering::SeqCst);
            self.flags.fetch_or(flags.bits(), Ordering::SeqCst);
        }
        fn clear_flags(&self, flags: CoprocessorFlags) {
            self.flags.fetch_and(!flags.bits(), Ordering::SeqCst);
        }
        fn push_model_id(&self, id: u8) {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            self.model.store(id, Ordering::SeqCst);
        }
        fn model_id(&self) -> u8 {
            self.model.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubCoprocessor;
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn erased_word_means_absent() {
        let shared = SharedArea::new();
        assert!(!HandshakeCoprocessor::new(ERASED_WORD, &shared).is_present());
        let cop = HandshakeCoprocessor::new(0x0804_0001, &shared);
        assert!(cop.is_present());
        assert_eq!(cop.entry(), Some(0x0804_0001));
    }

    #[test]
    fn image_clears_pending_save() {
        let shared = SharedArea::new();
        let cop = HandshakeCoprocessor::new(0x0804_0001, &shared);
        cop.start();
        assert!(shared.is_running());
        cop.request_save();
        assert!(cop.poll_flags().contains(CoprocessorFlags::SAVE_PENDING));
        shared.image_clear(CoprocessorFlags::SAVE_PENDING);
        assert!(!cop.poll_flags().contains(CoprocessorFlags::SAVE_PENDING));
    }

    #[test]
    fn model_id_round_trip_through_shared_area() {
        let shared = SharedArea::new();
        let cop = HandshakeCoprocessor::new(0x0804_0001, &shared);
        cop.push_model_id(7);
        assert_eq!(shared.requested_model_id(), 7);
        shared.image_report_model_id(7);
        assert_eq!(cop.model_id(), 7);
    }

    #[test]
    fn save_handshake_acknowledged() {
        let cop = StubCoprocessor::new(true, Some(3));
        let outcome = block_on(save_handshake(
            &cop,
            Duration::from_millis(1_000),
            Duration::from_millis(1),
        ));
        assert_eq!(outcome, SaveOutcome::Acknowledged);
    }

    #[test]
    fn save_handshake_gives_up_after_timeout() {
        let cop = StubCoprocessor::new(true, None);
        let start = Instant::now();
        let outcome = block_on(save_handshake(
            &cop,
            Duration::from_millis(50),
            Duration::from_millis(5),
        ));
        let waited = Instant::now() - start;
        assert_eq!(outcome, SaveOutcome::TimedOut);
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_millis(500));
    }

    #[test]
    fn flags_compose() {
        let f = CoprocessorFlags::SAVE_PENDING | CoprocessorFlags::MODEL_ID_PENDING;
        assert!(f.contains(CoprocessorFlags::SAVE_PENDING));
        assert!(!f.contains(CoprocessorFlags::SHOW_BOOT_ICON));
    }
}
