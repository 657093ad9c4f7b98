//! Property-based testing strategies.

use proptest::prelude::*;
use skirmish_core::entity::Stance;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::modifier::ResearchModifier;

/// Generate a fixed-point coordinate on a 200 × 200 map.
pub fn arb_coordinate() -> impl Strategy<Value = Fixed> {
    (-100i32..100i32).prop_map(Fixed::from_num)
}

/// Generate a map position.
pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
    (arb_coordinate(), arb_coordinate()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
}

/// Generate a multiplier between 0.50 and 2.00 in hundredths.
pub fn arb_multiplier() -> impl Strategy<Value = Fixed> {
    (50i32..=200i32).prop_map(|n| Fixed::from_num(n) / 100)
}

/// Generate a research modifier touching the weapon fields.
pub fn arb_weapon_modifier() -> impl Strategy<Value = ResearchModifier> {
    (arb_multiplier(), arb_multiplier(), arb_multiplier(), arb_multiplier()).prop_map(
        |(projectile_damage, beam_damage, attack_rate, weapon_range)| ResearchModifier {
            projectile_damage,
            beam_damage,
            attack_rate,
            weapon_range,
            ..ResearchModifier::IDENTITY
        },
    )
}

/// Generate a tick length, including zero-length ticks.
pub fn arb_delta_ms() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0_u64), 1u64..=250u64]
}

/// Generate a unit stance.
pub fn arb_stance() -> impl Strategy<Value = Stance> {
    prop_oneof![Just(Stance::Aggressive), Just(Stance::Passive)]
}

/// Generate health values (1-1000).
pub fn arb_health() -> impl Strategy<Value = Fixed> {
    (1i32..1000i32).prop_map(Fixed::from_num)
}

/// Generate damage values (1-100).
pub fn arb_damage() -> impl Strategy<Value = Fixed> {
    (1i32..100i32).prop_map(Fixed::from_num)
}
