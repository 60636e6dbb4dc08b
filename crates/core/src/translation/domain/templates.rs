use super::caption_style::CaptionStyle;

/// Canned captions: `(token, concise, detailed)`.
const TEMPLATES: &[(&str, &str, &str)] = &[
    ("HELLO", "Hello", "Hello! The user just greeted me."),
    ("REPEAT", "Repeat?", "Could you please repeat that? I didn't quite catch it."),
    ("SLOW", "Slower", "Please go slower. I'm having trouble keeping up."),
    ("THANKS", "Thanks", "Thank you for that. I really appreciate it."),
    ("HOW", "How?", "How? The user is asking about a method or way."),
    ("YOU", "You", "You, the user is referring to you."),
    ("CAN", "Can", "Can, the user is expressing ability or asking permission."),
    ("SEE_YOU_LATER", "See you later", "See you later! The user is saying goodbye."),
    ("FATHER", "Father", "Father, the user is referring to their father."),
    ("MOTHER", "Mother", "Mother, the user is referring to their mother."),
];

pub fn template_for(token: &str, style: CaptionStyle) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(t, _, _)| *t == token)
        .map(|(_, concise, detailed)| match style {
            CaptionStyle::Concise => *concise,
            CaptionStyle::Detailed => *detailed,
        })
}

/// Template caption, or the bare token when none exists.
pub fn template_caption(token: &str, style: CaptionStyle) -> String {
    template_for(token, style)
        .map(str::to_string)
        .unwrap_or_else(|| token.to_string())
}
