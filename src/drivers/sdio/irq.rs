//! SDIO card interrupt relay
//!
//! The card signals interrupts on DAT1. The host raises them to the platform,
//! which calls [`CardIrqRelay::on_card_interrupt`] from its interrupt handler.
//! The relay masks the host card interrupt before delivering, so the client
//! handler runs at most once per [`CardIrqRelay::enable`]. Edges seen while
//! masked are coalesced into the next enable.

use core::sync::atomic::{AtomicBool, Ordering};

use atomic_refcell::AtomicRefCell;

use super::SdioError;

/// Host side switch for the card interrupt
pub trait CardInterruptControl {
    /// Unmask (`true`) or mask the card interrupt in the host
    fn set_card_interrupt(&self, enable: bool);
}

/// Client handler, called in interrupt context with the registered user word.
/// Must not block or touch the bus lock.
pub type CardIrqHandler = fn(usize);

/// Forwards host card interrupts to one registered client handler
pub struct CardIrqRelay<C> {
    control: C,
    handler: AtomicRefCell<Option<(CardIrqHandler, usize)>>,
    armed: AtomicBool,
}

impl<C: CardInterruptControl> CardIrqRelay<C> {
    pub const fn new(control: C) -> Self {
        Self {
            control,
            handler: AtomicRefCell::new(None),
            armed: AtomicBool::new(false),
        }
    }

    /// Install `handler`, replacing any previous one.
    ///
    /// The relay is left disarmed. Fails with [`SdioError::LockTimeout`] if
    /// an interrupt is being delivered right now; the relay state is then
    /// unchanged.
    pub fn register(&self, handler: CardIrqHandler, data: usize) -> Result<(), SdioError> {
        let mut slot = self
            .handler
            .try_borrow_mut()
            .map_err(|_| SdioError::LockTimeout)?;
        self.disable();
        *slot = Some((handler, data));
        log::debug!("SDIO: card interrupt handler registered, data={:#x}", data);
        Ok(())
    }

    /// Remove the handler and mask the interrupt
    pub fn unregister(&self) -> Result<(), SdioError> {
        let mut slot = self
            .handler
            .try_borrow_mut()
            .map_err(|_| SdioError::LockTimeout)?;
        self.disable();
        *slot = None;
        Ok(())
    }

    /// Arm the relay and unmask the host card interrupt
    pub fn enable(&self) {
        self.armed.store(true, Ordering::Release);
        self.control.set_card_interrupt(true);
    }

    /// Disarm the relay and mask the host card interrupt
    pub fn disable(&self) {
        self.armed.store(false, Ordering::Release);
        self.control.set_card_interrupt(false);
    }

    pub fn is_enabled(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Interrupt entry. Returns `true` if the handler was called.
    pub fn on_card_interrupt(&self) -> bool {
        if !self.armed.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.control.set_card_interrupt(false);

        let Ok(slot) = self.handler.try_borrow() else {
            return false;
        };
        match *slot {
            Some((handler, data)) => {
                handler(data);
                true
            }
            None => {
                log::warn!("SDIO: card interrupt with no handler registered");
                false
            }
        }
    }

    pub fn control(&self) -> &C {
        &self.control
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct MaskBit {
        enabled: AtomicBool,
        writes: AtomicUsize,
    }

    impl CardInterruptControl for MaskBit {
        fn set_card_interrupt(&self, enable: bool) {
            self.enabled.store(enable, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    static DELIVERED: AtomicUsize = AtomicUsize::new(0);
    static LAST_DATA: AtomicUsize = AtomicUsize::new(0);

    fn count_irq(data: usize) {
        DELIVERED.fetch_add(1, Ordering::SeqCst);
        LAST_DATA.store(data, Ordering::SeqCst);
    }

    static OTHER: AtomicUsize = AtomicUsize::new(0);

    fn other_irq(_data: usize) {
        OTHER.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_delivers_once_per_enable() {
        let relay = CardIrqRelay::new(MaskBit::default());
        relay.register(count_irq, 0xC0FFEE).unwrap();
        assert!(!relay.control().enabled.load(Ordering::SeqCst));

        relay.enable();
        assert!(relay.control().enabled.load(Ordering::SeqCst));
        assert!(relay.on_card_interrupt());
        assert!(!relay.control().enabled.load(Ordering::SeqCst));
        assert!(!relay.on_card_interrupt());
        assert!(!relay.on_card_interrupt());
        assert_eq!(DELIVERED.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_DATA.load(Ordering::SeqCst), 0xC0FFEE);

        relay.enable();
        assert!(relay.on_card_interrupt());
        assert_eq!(DELIVERED.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_relay_drops_edges() {
        let relay = CardIrqRelay::new(MaskBit::default());
        relay.register(other_irq, 0).unwrap();
        assert!(!relay.on_card_interrupt());

        relay.enable();
        relay.disable();
        assert!(!relay.is_enabled());
        assert!(!relay.on_card_interrupt());
        assert_eq!(OTHER.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_handler() {
        let relay = CardIrqRelay::new(MaskBit::default());
        relay.enable();
        assert!(!relay.on_card_interrupt());
        assert!(!relay.is_enabled());
    }

    #[test]
    fn test_register_during_delivery_keeps_state() {
        let relay = CardIrqRelay::new(MaskBit::default());
        relay.register(other_irq, 7).unwrap();
        relay.enable();

        let delivering = relay.handler.borrow();
        assert_eq!(relay.register(count_irq, 8), Err(SdioError::LockTimeout));
        assert_eq!(relay.unregister(), Err(SdioError::LockTimeout));
        assert!(relay.is_enabled());
        assert!(relay.control().enabled.load(Ordering::SeqCst));
        assert_eq!((*delivering).map(|(_, data)| data), Some(7));
        drop(delivering);

        relay.register(count_irq, 8).unwrap();
        assert!(!relay.is_enabled());
    }

    #[test]
    fn test_unregister_masks() {
        let relay = CardIrqRelay::new(MaskBit::default());
        relay.register(other_irq, 1).unwrap();
        relay.enable();
        relay.unregister().unwrap();
        assert!(!relay.control().enabled.load(Ordering::SeqCst));
        relay.enable();
        assert!(!relay.on_card_interrupt());
    }
}
