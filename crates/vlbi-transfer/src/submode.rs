use bitflags::bitflags;

bitflags! {
    /// Orthogonal state bits layered on top of the major [`crate::TransferMode`].
    /// A hand-rolled flag map in the source (`get_flagmap`); `bitflags!` gives
    /// the same named-bit semantics with compile-time checked operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TransferSubmode: u32 {
        const PAUSE     = 0x1;
        const RUN       = 0x2;
        const WAIT      = 0x4;
        const CONNECTED = 0x8;
        const BROKEN    = 0x10;
    }
}

impl std::fmt::Display for TransferSubmode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:?}>", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_clear() {
        let mut sm = TransferSubmode::empty();
        sm |= TransferSubmode::CONNECTED;
        sm |= TransferSubmode::WAIT;
        assert!(sm.contains(TransferSubmode::CONNECTED));
        assert!(sm.contains(TransferSubmode::WAIT));
        assert!(!sm.contains(TransferSubmode::RUN));

        sm.remove(TransferSubmode::WAIT);
        assert!(!sm.contains(TransferSubmode::WAIT));
    }
}
