//! Ranking derivation: a pure function of the session state and the roster,
//! never stored.

use indexmap::IndexSet;

use crate::config::Team;

use super::SessionPhase;

/// How many teams the finished view puts on the podium.
const PODIUM_SIZE: usize = 3;

/// Order in which teams should be displayed.
///
/// While the round is live, teams that buzzed come first (in press order),
/// followed by the remaining roster in insertion order. Once finished, only
/// the podium is shown: the first three pressed teams, padded with the
/// remaining roster in insertion order when fewer than three buzzed (a round
/// without any buzz events shows the first three roster teams). Indices that
/// no longer fit the roster are skipped.
pub fn display_order<'a>(
    phase: SessionPhase,
    press_order: &IndexSet<usize>,
    teams: &'a [Team],
) -> Vec<&'a Team> {
    let mut order: Vec<&Team> = press_order
        .iter()
        .filter_map(|&index| teams.get(index))
        .collect();
    for (index, team) in teams.iter().enumerate() {
        if !press_order.contains(&index) {
            order.push(team);
        }
    }

    if phase == SessionPhase::Finished {
        order.truncate(PODIUM_SIZE);
    }
    order
}
