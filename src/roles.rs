//! Role distribution and dealing.
//!
//! | players | roles |
//! |---|---|
//! | 5 | 1 mafia, 1 sheriff, 3 civilians |
//! | 6 | 1 don, 1 mafia, 1 sheriff, 3 civilians |
//! | 7-8 | 1 don, 1 mafia, 1 sheriff, 1 doctor, civilians |
//! | 9-10 | 1 don, 2 mafia, 1 sheriff, 1 doctor, civilians |

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{Role, MAX_PLAYERS, MIN_PLAYERS};

/// Roles for `player_count` participants, unshuffled.
///
/// `player_count` must be within 5..=10; counts outside that range are
/// clamped before the table lookup.
pub fn distribution(player_count: usize) -> Vec<Role> {
    let n = player_count.clamp(MIN_PLAYERS, MAX_PLAYERS);
    let mut roles = match n {
        5 => vec![Role::Mafia, Role::Sheriff],
        6 => vec![Role::Don, Role::Mafia, Role::Sheriff],
        7 | 8 => vec![Role::Don, Role::Mafia, Role::Sheriff, Role::Doctor],
        _ => vec![
            Role::Don,
            Role::Mafia,
            Role::Mafia,
            Role::Sheriff,
            Role::Doctor,
        ],
    };
    roles.resize(n, Role::Civilian);
    roles
}

/// Shuffled roles for `player_count` participants (uniform Fisher-Yates)
pub fn deal<R: Rng>(player_count: usize, rng: &mut R) -> Vec<Role> {
    let mut roles = distribution(player_count);
    roles.shuffle(rng);
    roles
}
