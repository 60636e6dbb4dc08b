/// A supported sign: identifier, canonical gloss, and display description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phrase {
    pub token: &'static str,
    pub gloss: &'static str,
    pub description: &'static str,
}

pub const PHRASES: &[Phrase] = &[
    Phrase {
        token: "HELLO",
        gloss: "HELLO",
        description: "Greeting, open palm waved near the head",
    },
    Phrase {
        token: "THANKS",
        gloss: "THANK-YOU",
        description: "Flat hand moving forward from the chin",
    },
    Phrase {
        token: "REPEAT",
        gloss: "AGAIN PLEASE",
        description: "Request to repeat the last utterance",
    },
    Phrase {
        token: "SLOW",
        gloss: "SLOW-DOWN PLEASE",
        description: "Request to sign or speak more slowly",
    },
    Phrase {
        token: "HOW",
        gloss: "HOW",
        description: "Question about manner or method",
    },
    Phrase {
        token: "YOU",
        gloss: "YOU",
        description: "Pointing at the addressee",
    },
    Phrase {
        token: "CAN",
        gloss: "CAN",
        description: "Ability or permission, both fists moving down",
    },
    Phrase {
        token: "SEE_YOU_LATER",
        gloss: "SEE YOU LATER",
        description: "Farewell",
    },
    Phrase {
        token: "FATHER",
        gloss: "FATHER",
        description: "Open hand, thumb at the forehead",
    },
    Phrase {
        token: "MOTHER",
        gloss: "MOTHER",
        description: "Open hand, thumb at the chin",
    },
];

pub fn lookup(token: &str) -> Option<&'static Phrase> {
    PHRASES.iter().find(|p| p.token == token)
}

/// Canonical gloss for `token`, or the token itself when unknown.
pub fn gloss_for(token: &str) -> &str {
    lookup(token).map(|p| p.gloss).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<_> = PHRASES.iter().map(|p| p.token).collect();
        assert_eq!(tokens.len(), PHRASES.len());
    }

    #[test]
    fn test_lookup_known_token() {
        assert_eq!(lookup("THANKS").unwrap().gloss, "THANK-YOU");
    }

    #[test]
    fn test_unknown_token_glosses_to_itself() {
        assert!(lookup("PIZZA").is_none());
        assert_eq!(gloss_for("PIZZA"), "PIZZA");
    }
}
