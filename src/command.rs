//! Terminal commands standing in for taps on the translator screen.

use pawlingo_core::Pet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tap on the recorder
    Toggle,
    SelectPet(Pet),
    /// Flip the translation direction
    Swap,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "r" | "rec" | "record" => Command::Toggle,
            "cat" => Command::SelectPet(Pet::Cat),
            "dog" => Command::SelectPet(Pet::Dog),
            "swap" | "s" => Command::Swap,
            "help" | "h" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &str = "\
  <enter>, r   start or stop recording
  cat, dog     choose who is talking
  swap         switch translation direction
  help         show this message
  q            quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse(""), Command::Toggle);
        assert_eq!(Command::parse("  R \n"), Command::Toggle);
        assert_eq!(Command::parse("Cat"), Command::SelectPet(Pet::Cat));
        assert_eq!(Command::parse("dog"), Command::SelectPet(Pet::Dog));
        assert_eq!(Command::parse("swap"), Command::Swap);
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("bark"), Command::Unknown("bark".to_string()));
    }
}
