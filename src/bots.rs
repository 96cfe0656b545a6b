//! Synthetic participants: identities, speech and target choices.
//!
//! The phase scheduler never branches on "is this a bot" beyond asking the
//! participant for its [`DecisionPolicy`]. Policies are stateless; all the
//! knowledge a bot may use is handed to it in a [`BotView`].

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::types::{Participant, ParticipantId, ParticipantKind, Role, Team};
use std::sync::Arc;

/// What the scheduler is asking a bot for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Introduction speaking turn
    Introduce,
    /// Day discussion speaking turn
    Discuss,
    NightAction,
    Vote,
}

/// Another alive participant as seen by the bot
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: ParticipantId,
    pub name: String,
    /// Team if the bot legitimately knows it (teammates, sheriff checks)
    pub known_team: Option<Team>,
}

/// Everything a bot is allowed to know when deciding
#[derive(Debug, Clone)]
pub struct BotView {
    pub me: ParticipantId,
    pub role: Role,
    /// Alive participants other than the bot itself, in seat order
    pub candidates: Vec<Candidate>,
}

impl BotView {
    pub fn team(&self) -> Team {
        self.role.team()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotMove {
    Say(String),
    Target {
        target: ParticipantId,
        /// Optional line shared with teammates (mafia coordination)
        line: Option<String>,
    },
    Pass,
}

/// Decision capability attached to every synthetic participant
pub trait DecisionPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn decide(&self, view: &BotView, prompt: Prompt, rng: &mut StdRng) -> BotMove;
}

/// Default bot brain: plausible chatter and team-aware random targeting
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicPolicy;

impl HeuristicPolicy {
    pub const NAME: &'static str = "heuristic";
}

impl DecisionPolicy for HeuristicPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn decide(&self, view: &BotView, prompt: Prompt, rng: &mut StdRng) -> BotMove {
        match prompt {
            Prompt::Introduce => BotMove::Say(intro_phrase(view.role, rng)),
            Prompt::Discuss => match pick_suspect(view, rng) {
                Some(suspect) => BotMove::Say(accuse_phrase(view.team(), &suspect.name, rng)),
                None => BotMove::Say(pick(DEFEND_PHRASES, rng).to_string()),
            },
            Prompt::NightAction => night_move(view, rng),
            Prompt::Vote => match pick_suspect(view, rng) {
                Some(suspect) => BotMove::Target {
                    target: suspect.id.clone(),
                    line: None,
                },
                None => BotMove::Pass,
            },
        }
    }
}

fn night_move(view: &BotView, rng: &mut StdRng) -> BotMove {
    let choice = match view.role {
        // Mafia only ever hunts the town
        Role::Mafia | Role::Don => {
            pick_target(&view.candidates, rng, |c| c.known_team == Some(Team::Town))
        }
        // Candidates never include the bot itself, so a bot doctor always
        // covers someone else. Self-protection is left to human doctors.
        Role::Doctor => pick_target(&view.candidates, rng, |_| true),
        // Prefer someone not checked yet
        Role::Sheriff => pick_target(&view.candidates, rng, |c| c.known_team.is_none()),
        Role::Civilian => None,
    };

    match choice {
        Some(target) => BotMove::Target {
            target: target.id.clone(),
            line: (view.team() == Team::Mafia).then(|| night_phrase(&target.name, rng)),
        },
        None => BotMove::Pass,
    }
}

/// Who this bot suspects (and would vote for) right now
pub fn pick_suspect<'a>(view: &'a BotView, rng: &mut StdRng) -> Option<&'a Candidate> {
    match view.team() {
        Team::Mafia => pick_target(&view.candidates, rng, |c| c.known_team != Some(Team::Mafia)),
        Team::Town => {
            let exposed: Vec<&Candidate> = view
                .candidates
                .iter()
                .filter(|c| c.known_team == Some(Team::Mafia))
                .collect();
            if let Some(found) = exposed.choose(rng) {
                return Some(*found);
            }
            pick_target(&view.candidates, rng, |c| c.known_team != Some(Team::Town))
        }
    }
}

/// Random candidate among those matching `prefer`, falling back to anyone
pub fn pick_target<'a, F>(
    candidates: &'a [Candidate],
    rng: &mut StdRng,
    prefer: F,
) -> Option<&'a Candidate>
where
    F: Fn(&Candidate) -> bool,
{
    let preferred: Vec<&Candidate> = candidates.iter().filter(|c| prefer(c)).collect();
    if let Some(found) = preferred.choose(rng) {
        return Some(*found);
    }
    candidates.choose(rng)
}

// ========== Identities ==========

const AVATAR_COLORS: &[&str] = &[
    "#6366f1", "#8b5cf6", "#a855f7", "#d946ef", "#ec4899", "#f43f5e", "#ef4444", "#f97316",
    "#eab308", "#84cc16", "#22c55e", "#14b8a6", "#06b6d4", "#3b82f6", "#2563eb", "#7c3aed",
];

/// Create a fresh synthetic participant driven by `policy`
pub fn create_bot(policy: Arc<dyn DecisionPolicy>) -> Participant {
    let mut rng = rand::rng();
    let id = format!("bot_{}", ulid::Ulid::new().to_string().to_lowercase());
    let nickname = petname::petname(1, "")
        .map(|name| capitalize(&name))
        .unwrap_or_else(|| format!("{:03}", rng.random_range(0..1000)));
    let color = AVATAR_COLORS
        .choose(&mut rng)
        .map(|c| c.to_string());

    Participant {
        user_id: id.clone(),
        id,
        name: format!("Bot_{}", nickname),
        avatar: None,
        avatar_color: color,
        kind: ParticipantKind::Synthetic(policy),
        role: None,
        alive: true,
        seat: 0,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ========== Speech ==========

const INTRO_CIVILIAN: &[&str] = &[
    "Hi everyone! Just a regular citizen hoping to survive the night.",
    "Good evening! I don't know anyone here, but do I look suspicious? No? Great.",
    "Hello! Ordinary townsperson, nothing to hide.",
    "Hey all, I'm new here, but I swear I'm on the town's side!",
    "Evening! Peaceful, calm, not planning to hurt anybody.",
    "Trust me, I'm the most harmless person at this table.",
];

const INTRO_MAFIA: &[&str] = &[
    "Hi all! Completely peaceful, word of honour.",
    "Good evening! Do I look nervous? It's just the lighting...",
    "Hey hey! Playing for the town, no questions asked.",
    "Hello! Honest citizen, ready to help find the mafia!",
    "Greetings! I'm with the town, let's track them down.",
];

const INTRO_DON: &[&str] = &[
    "Good evening, ladies and gentlemen. I am a respected member of this town.",
    "Greetings all! Businessman, with an alibi for every night.",
    "Hello! Happy to lead the investigation, I've played this before.",
    "Evening. Let's approach this logically, shall we?",
];

const INTRO_SHERIFF: &[&str] = &[
    "Good evening! I'm all about justice. Mafia, beware.",
    "Hi! I've got good instincts, let's find the villains.",
    "Hello everyone! I'm watching each of you closely.",
    "Greetings! I'm here to protect this town.",
];

const INTRO_DOCTOR: &[&str] = &[
    "Good evening! I'm with the town, and I have ways to help.",
    "Hi! I'll try to save whoever I can. Believe me.",
    "Hello! I have a peaceful profession, I wish nobody harm.",
    "Hey all! I'm here to help, not to hurt.",
];

const ACCUSE_TOWN: &[&str] = &[
    "I think {target} is acting suspicious. My vote goes there!",
    "{target} is way too quiet. Let's check them!",
    "I'm pretty sure {target} is mafia. Bad feeling about this one.",
    "Keep an eye on {target}, something's off.",
    "{target} defends themselves a little too confidently.",
];

const ACCUSE_MAFIA: &[&str] = &[
    "Honestly, {target} has been dodging every question.",
    "I don't want to point fingers, but {target} worries me.",
    "Has anyone else noticed how {target} keeps changing the subject?",
    "Let's not rush, but {target} is my best guess.",
];

const DEFEND_PHRASES: &[&str] = &[
    "I'm definitely town! Check someone else.",
    "Don't vote for me, I'm not the mafia!",
    "This is a mistake! I'm with the town, let's think logically.",
    "I'm innocent! The mafia is trying to frame me.",
];

const NIGHT_MAFIA_PHRASES: &[&str] = &[
    "Let's take out {target}, they're too dangerous.",
    "{target} is our target. They could expose us.",
    "I suggest {target}. Far too active.",
    "My vote is {target}.",
];

fn pick(pool: &'static [&'static str], rng: &mut StdRng) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

pub fn intro_phrase(role: Role, rng: &mut StdRng) -> String {
    let pool = match role {
        Role::Civilian => INTRO_CIVILIAN,
        Role::Mafia => INTRO_MAFIA,
        Role::Don => INTRO_DON,
        Role::Sheriff => INTRO_SHERIFF,
        Role::Doctor => INTRO_DOCTOR,
    };
    pick(pool, rng).to_string()
}

pub fn accuse_phrase(team: Team, target_name: &str, rng: &mut StdRng) -> String {
    let pool = match team {
        Team::Town => ACCUSE_TOWN,
        Team::Mafia => ACCUSE_MAFIA,
    };
    pick(pool, rng).replace("{target}", target_name)
}

pub fn night_phrase(target_name: &str, rng: &mut StdRng) -> String {
    pick(NIGHT_MAFIA_PHRASES, rng).replace("{target}", target_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn candidate(id: &str, known_team: Option<Team>) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: id.to_uppercase(),
            known_team,
        }
    }

    fn view(role: Role, candidates: Vec<Candidate>) -> BotView {
        BotView {
            me: "me".to_string(),
            role,
            candidates,
        }
    }

    #[test]
    fn test_mafia_night_target_is_town() {
        let mut rng = StdRng::seed_from_u64(1);
        let v = view(
            Role::Don,
            vec![
                candidate("ally", Some(Team::Mafia)),
                candidate("a", Some(Team::Town)),
                candidate("b", Some(Team::Town)),
            ],
        );

        for _ in 0..30 {
            match HeuristicPolicy.decide(&v, Prompt::NightAction, &mut rng) {
                BotMove::Target { target, line } => {
                    assert_ne!(target, "ally");
                    assert!(line.is_some(), "mafia should coordinate with a line");
                }
                other => panic!("Expected Target, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_doctor_night_target_has_no_line() {
        let mut rng = StdRng::seed_from_u64(2);
        let v = view(Role::Doctor, vec![candidate("a", None)]);
        assert_eq!(
            HeuristicPolicy.decide(&v, Prompt::NightAction, &mut rng),
            BotMove::Target {
                target: "a".to_string(),
                line: None
            }
        );
    }

    #[test]
    fn test_civilian_passes_at_night() {
        let mut rng = StdRng::seed_from_u64(3);
        let v = view(Role::Civilian, vec![candidate("a", None)]);
        assert_eq!(
            HeuristicPolicy.decide(&v, Prompt::NightAction, &mut rng),
            BotMove::Pass
        );
    }

    #[test]
    fn test_sheriff_prefers_unchecked() {
        let mut rng = StdRng::seed_from_u64(4);
        let v = view(
            Role::Sheriff,
            vec![
                candidate("checked", Some(Team::Town)),
                candidate("fresh", None),
            ],
        );
        for _ in 0..20 {
            match HeuristicPolicy.decide(&v, Prompt::NightAction, &mut rng) {
                BotMove::Target { target, .. } => assert_eq!(target, "fresh"),
                other => panic!("Expected Target, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_town_votes_for_exposed_mafia() {
        let mut rng = StdRng::seed_from_u64(5);
        let v = view(
            Role::Sheriff,
            vec![
                candidate("a", None),
                candidate("villain", Some(Team::Mafia)),
                candidate("b", None),
            ],
        );
        for _ in 0..20 {
            match HeuristicPolicy.decide(&v, Prompt::Vote, &mut rng) {
                BotMove::Target { target, .. } => assert_eq!(target, "villain"),
                other => panic!("Expected Target, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_mafia_never_votes_for_teammate_when_avoidable() {
        let mut rng = StdRng::seed_from_u64(6);
        let v = view(
            Role::Mafia,
            vec![candidate("don", Some(Team::Mafia)), candidate("a", Some(Team::Town))],
        );
        for _ in 0..20 {
            match HeuristicPolicy.decide(&v, Prompt::Vote, &mut rng) {
                BotMove::Target { target, .. } => assert_eq!(target, "a"),
                other => panic!("Expected Target, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_vote_without_candidates_passes() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = view(Role::Civilian, vec![]);
        assert_eq!(HeuristicPolicy.decide(&v, Prompt::Vote, &mut rng), BotMove::Pass);

        // Alone at the table a bot defends itself instead of accusing
        match HeuristicPolicy.decide(&v, Prompt::Discuss, &mut rng) {
            BotMove::Say(text) => assert!(DEFEND_PHRASES.contains(&text.as_str())),
            other => panic!("Expected Say, got {:?}", other),
        }
    }

    #[test]
    fn test_intro_phrase_keyed_by_role() {
        let mut rng = StdRng::seed_from_u64(8);
        let line = intro_phrase(Role::Sheriff, &mut rng);
        assert!(INTRO_SHERIFF.contains(&line.as_str()));
    }

    #[test]
    fn test_accuse_phrase_names_target() {
        let mut rng = StdRng::seed_from_u64(9);
        assert!(accuse_phrase(Team::Town, "Alice", &mut rng).contains("Alice"));
        assert!(accuse_phrase(Team::Mafia, "Bob", &mut rng).contains("Bob"));
        assert!(night_phrase("Carol", &mut rng).contains("Carol"));
    }

    #[test]
    fn test_create_bot_identity() {
        let bot = create_bot(Arc::new(HeuristicPolicy));
        assert!(bot.id.starts_with("bot_"));
        assert!(bot.name.starts_with("Bot_"));
        assert_eq!(bot.user_id, bot.id);
        assert!(bot.is_bot());
        assert!(bot.avatar_color.is_some());
    }
}
