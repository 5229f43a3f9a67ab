use crate::models::{GradeLevel, Language, Subject};

/// Admin modifier as written into prompts; blank means no override.
fn modifier_or_none(modifier: &str) -> &str {
    if modifier.trim().is_empty() {
        "None"
    } else {
        modifier
    }
}

/// System instruction for a tutoring session.
pub fn system_instruction(
    grade: GradeLevel,
    subject: Subject,
    language: Language,
    country: &str,
    ai_modifier: &str,
) -> String {
    let learning_style = if grade.is_middle_school() {
        "Analogy-First Learning: Use relatable analogies."
    } else {
        "First Principles: Explain underlying logic."
    };

    format!(
        "SYSTEM PROMPT - ELITE STUDY MENTOR
User Location: {country}
Student Level: {grade}
Subject: {subject}
Language: Always respond in {language}.

PLATFORM MODIFIER (STRICTLY FOLLOW THIS): {modifier}

CORE TUTORING PHILOSOPHY:
- Respond in {language}.
- Socratic Scaffolding: Never just give the answer. Lead the student there.
- {learning_style}
- Academic Clarity: Use LaTeX ($...$) for math and science notation.
- Cultural Context: Since the user is from {country}, feel free to use local examples if relevant to the topic.

MIDDLE SCHOOL PROTOCOL:
- Use clear, straightforward language.
- Break multi-step problems into single chunks.
- Be extremely encouraging.

BEHAVIORAL RULES:
- Always encourage showing work.
",
        modifier = modifier_or_none(ai_modifier),
    )
}

/// First message of every session.
pub fn welcome_prompt(topic: &str) -> String {
    format!(
        "Welcome the student warmly. Topic: {}. Provide a short intro with an analogy and ask one question to start.",
        topic.trim()
    )
}

/// Quiz request body; schema guidance is appended by the quiz generator.
pub fn quiz_prompt(
    grade: GradeLevel,
    subject: Subject,
    language: Language,
    context: &str,
    ai_modifier: &str,
) -> String {
    format!(
        "Generate a fun multiple choice question in {language} with exactly 4 options.
Context: {context}. Subject: {subject}. Level: {grade}.
PLATFORM MODIFIER: {modifier}",
        modifier = modifier_or_none(ai_modifier),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_profile_and_modifier() {
        let text = system_instruction(
            GradeLevel::Grade9To10,
            Subject::Physics,
            Language::English,
            "Canada",
            "Use hockey examples",
        );
        assert!(text.contains("User Location: Canada"));
        assert!(text.contains("Student Level: Grade 9-10"));
        assert!(text.contains("Subject: Physics"));
        assert!(text.contains("(STRICTLY FOLLOW THIS): Use hockey examples"));
        assert!(text.contains("First Principles"));
    }

    #[test]
    fn blank_modifier_reads_as_none_and_middle_school_gets_analogies() {
        let text = system_instruction(
            GradeLevel::Grade6To8,
            Subject::Mathematics,
            Language::English,
            "South Africa",
            "  ",
        );
        assert!(text.contains("(STRICTLY FOLLOW THIS): None"));
        assert!(text.contains("Analogy-First Learning"));
    }
}
