//! Canned translations.

use pawlingo_core::Config;
use rand::Rng;
use rand::seq::SliceRandom;

/// Used when there is nothing to pick from.
pub const FALLBACK_PHRASE: &str = "Something was said!";

const BUILTIN: &[&str] = &[
    "I'm hungry, feed me now!",
    "Let's go for a walk!",
    "Play with me, please!",
    "I love you so much!",
    "Who's at the door?",
    "Can I have a treat?",
    "I need some attention right now.",
    "This is my spot, find another one.",
    "I'm bored. Entertain me.",
    "Did you just say my name?",
    "The squirrel is back!",
    "Wake up, it's breakfast time.",
];

/// The list a translation is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseBook {
    phrases: Vec<String>,
}

impl PhraseBook {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN.iter().map(|p| p.to_string()).collect())
    }

    /// The configured list, or the built-in one when none is configured.
    pub fn from_config(config: &Config) -> Self {
        match config.phrases() {
            Some(phrases) => Self::new(phrases.to_vec()),
            None => Self::builtin(),
        }
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.phrases.iter().any(|p| p == phrase)
    }

    /// A random phrase, or [`FALLBACK_PHRASE`] for an empty book.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.phrases
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(FALLBACK_PHRASE)
    }
}

impl Default for PhraseBook {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_pick_comes_from_book() {
        let book = PhraseBook::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let phrase = book.pick(&mut rng);
            assert!(book.contains(phrase));
        }
    }

    #[test]
    fn test_empty_book_uses_fallback() {
        let book = PhraseBook::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(book.is_empty());
        assert_eq!(book.pick(&mut rng), FALLBACK_PHRASE);
    }

    #[test]
    fn test_config_overrides_builtin() {
        let config = Config {
            phrases: Some(vec!["Meow.".to_string()]),
            ..Default::default()
        };
        let book = PhraseBook::from_config(&config);
        assert_eq!(book.len(), 1);
        assert_eq!(book.pick(&mut StdRng::seed_from_u64(3)), "Meow.");

        assert_eq!(PhraseBook::from_config(&Config::default()), PhraseBook::builtin());
    }
}
