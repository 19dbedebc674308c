//! Register layout for a debugger target description (spec §6). The
//! ordering and the register set itself already live on the root crate's
//! [`bee::RegisterId`]/[`bee::registers::REGISTER_LAYOUT`]; this module
//! only adds what's specific to presenting that layout to a debugger
//! front-end — stable short names, since the core crate has no reason to
//! name its own registers as strings.

pub use bee::registers::REGISTER_LAYOUT;
pub use bee::RegisterId;

/// The short name a debugger front-end would print for each register,
/// matching the field names in [`bee::Registers`].
pub fn register_name(id: RegisterId) -> &'static str {
    match id {
        RegisterId::Pc => "pc",
        RegisterId::M0 => "m0",
        RegisterId::MSize => "msize",
        RegisterId::S0 => "s0",
        RegisterId::SSize => "ssize",
        RegisterId::Sp => "sp",
        RegisterId::D0 => "d0",
        RegisterId::DSize => "dsize",
        RegisterId::Dp => "dp",
        RegisterId::HandlerSp => "handler_sp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_register_in_the_layout_has_a_name() {
        for &id in REGISTER_LAYOUT.iter() {
            assert!(!register_name(id).is_empty());
        }
    }

    #[test]
    fn names_are_distinct() {
        let names: Vec<&str> = REGISTER_LAYOUT.iter().map(|&id| register_name(id)).collect();
        for (i, a) in names.iter().enumerate() {
            for b in names[i + 1..].iter() {
                assert_ne!(a, b);
            }
        }
    }
}
