//! Maps `Box<dyn Error>` from the link boundary to a typed `LinkFault`.
//!
//! `MachineLink` returns boxed errors so any transport can sit behind it;
//! the I/O loop needs to tell a dropped packet from a dead device. With the
//! `hardware` feature the known `HwError` is downcast precisely; otherwise
//! (and for foreign links) the message is classified heuristically.

use crate::error::LinkFault;

pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> LinkFault {
    #[cfg(feature = "hardware")]
    {
        use espresso_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Framing(f) => LinkFault::Framing(f.to_string()),
                HwError::Timeout => LinkFault::Timeout,
                HwError::NotConnected => LinkFault::Disconnected,
                HwError::Codec(c) => LinkFault::Rejected(c.to_string()),
                other @ (HwError::ShortRead { .. } | HwError::Io(_)) => {
                    LinkFault::Io(other.to_string())
                }
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        LinkFault::Timeout
    } else if lower.contains("not connected") {
        LinkFault::Disconnected
    } else if lower.contains("framing") || lower.contains("magic") {
        LinkFault::Framing(s)
    } else {
        LinkFault::Io(s)
    }
}
