use std::ops::RangeInclusive;

use rand::Rng;

/// Window used for random port selection when none is given.
pub const EPHEMERAL_PORTS: RangeInclusive<u16> = 10000..=65535;

/// Picks a random port in [`EPHEMERAL_PORTS`].
pub fn random_port() -> u16 {
    rand::thread_rng().gen_range(EPHEMERAL_PORTS)
}
