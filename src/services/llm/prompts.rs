use std::fmt::Write;

use crate::kernel::contracts::{CandidateResponse, ResponderInput, ValidationContext, MAX_FOLLOW_UPS, MAX_VOICE_WORDS};
use crate::kernel::turn::IntentTag;
use crate::retrieval::{EvidenceBundle, EvidenceStatus};

const PERSONA: &str = "\
You are Avery, the client concierge of a private bank. You help clients understand the \
bank's investment research documents. Present yourself as one assistant. Never mention \
internal steps, reviewers, other assistants, retries or transfers between them.";

const NO_EVIDENCE: &str = "No relevant information found in the knowledge base.";
const RETRIEVAL_DOWN: &str =
    "The knowledge base could not be reached. Say that the information is temporarily unavailable because of a technical issue. State no other facts.";

pub fn responder_system_prompt() -> String {
    format!(
        "{PERSONA}\n\n\
## RULES\n\
- Never invent facts: every figure, name or claim must come from the EVIDENCE block.\n\
- If the evidence has nothing relevant, say you don't have that information.\n\
- Never give personalised investment advice.\n\
- voice_str is spoken aloud: plain sentences, at most {MAX_VOICE_WORDS} words, no symbols or markdown.\n\
- text is shown on screen: markdown that elaborates on exactly what voice_str says.\n\
- send_to_ui is true only when text carries document content. Greetings use false.\n\
- follow_up_questions: 0 to {MAX_FOLLOW_UPS} questions about topics the evidence covers.\n\n\
## OUTPUT\n\
Respond with one JSON object:\n\
{{\"voice_str\": string, \"text\": string, \"send_to_ui\": bool, \"follow_up_questions\": [string]}}"
    )
}

pub fn responder_user_prompt(input: &ResponderInput, evidence: Option<&EvidenceBundle>) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "USER INTENT: {}", input.intent.as_label());
    let _ = writeln!(prompt, "USER MESSAGE: \"{}\"\n", input.user_query);

    if let Some(feedback) = &input.prior_feedback {
        let _ = writeln!(prompt, "## CORRECTIONS (Attempt {}/{})", input.attempt + 1, input.max_attempts);
        let _ = writeln!(prompt, "Your previous answer was not acceptable:\n{}", feedback.message);
        let _ = writeln!(
            prompt,
            "Fix exactly these issues. Keep voice_str and text on the same topic and use only the evidence.\n"
        );
    }

    prompt.push_str(&evidence_block(evidence));
    prompt
}

pub fn validator_system_prompt(intent: IntentTag) -> String {
    let grounding = match intent {
        IntentTag::Greet => "\
GREETING: identity and welcome language need no evidence. Any investment fact must appear in the evidence. \
send_to_ui should be false.",
        IntentTag::GeneralQuestion => "\
GENERAL QUESTION: statements about the assistant's own identity, capabilities and limits need no evidence. \
Any investment or document fact must appear in the evidence.",
        IntentTag::TopicQuestion => "\
TOPIC QUESTION: STRICT. Every factual claim in voice_str, text and follow_up_questions must be derivable \
from the evidence. An empty evidence block is valid grounding only if the response says the information \
is not available and adds no facts. If retrieval was unavailable, an answer that only reports a \
technical issue is valid grounding.",
        IntentTag::OutOfScope => "\
OUT OF SCOPE: the response must politely decline and provide no investment information.",
    };

    format!(
        "You check answers from a banking assistant before a client sees them.\n\n\
## TRACEABILITY\n{grounding}\n\n\
## CONSISTENCY\n\
voice_str and text must cover the same topic. text elaborates on voice_str and must not contradict it \
or discuss something else.\n\n\
## OUTPUT\n\
Respond with one JSON object:\n\
{{\"traceability_check\": bool, \"consistency_check\": bool, \"is_valid\": bool, \"feedback\": string, \"escalate\": bool}}\n\
is_valid is true only when both checks are true. When invalid, feedback names the exact unsupported claim \
or the exact mismatch. Vague feedback such as \"try again\" is not allowed. When valid, feedback is empty."
    )
}

pub fn validator_user_prompt(candidate: &CandidateResponse, evidence: &EvidenceBundle, context: &ValidationContext) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "## VALIDATION ATTEMPT: {}/{}", context.attempt + 1, context.max_attempts);
    let _ = writeln!(prompt, "## USER INTENT: {}\n", context.intent.as_label());
    let _ = writeln!(prompt, "## RESPONSE TO VALIDATE");
    let _ = writeln!(prompt, "voice_str: {}", candidate.voice_text);
    let _ = writeln!(prompt, "text:\n{}", candidate.display_text);
    let _ = writeln!(prompt, "send_to_ui: {}", candidate.surface_in_ui);
    let _ = writeln!(prompt, "follow_up_questions: {:?}\n", candidate.follow_ups);
    prompt.push_str(&evidence_block(Some(evidence)));
    prompt
}

fn evidence_block(evidence: Option<&EvidenceBundle>) -> String {
    let mut block = String::from("## EVIDENCE\n");
    match evidence {
        None => block.push_str("(no retrieval performed)\n"),
        Some(bundle) => match bundle.status() {
            EvidenceStatus::NotRequested => block.push_str("(no retrieval performed)\n"),
            EvidenceStatus::Unavailable => {
                block.push_str(RETRIEVAL_DOWN);
                block.push('\n');
            }
            EvidenceStatus::Retrieved if bundle.is_empty() => {
                block.push_str(NO_EVIDENCE);
                block.push('\n');
            }
            EvidenceStatus::Retrieved => {
                for (idx, item) in bundle.items().iter().enumerate() {
                    let _ = writeln!(block, "[Source {}]\n{}\n", idx + 1, item);
                }
            }
        },
    }
    block
}

pub fn intent_system_prompt() -> String {
    "\
Classify the client's message into exactly one intent:\n\
- \"greet\": a bare greeting with nothing else.\n\
- \"investment_related_question\": anything about investment research, strategy, markets, outlooks or the bank's documents.\n\
- \"general_question\": questions about the assistant itself (name, capabilities, limits) or conversational exchanges.\n\
- \"out_of_scope\": anything a bank representative cannot answer, including jokes and unrelated topics.\n\
Priority: a question about the assistant beats a greeting. Investment content beats everything else.\n\
Respond with one JSON object: {\"intent\": string, \"reasoning\": string, \"confidence\": number}"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::contracts::CorrectionFeedback;

    fn input(prior: Option<CorrectionFeedback>, attempt: u32) -> ResponderInput {
        ResponderInput {
            user_query: "GII top countries".to_string(),
            intent: IntentTag::TopicQuestion,
            prior_feedback: prior,
            evidence: None,
            attempt,
            max_attempts: 3,
        }
    }

    #[test]
    fn test_corrections_only_on_retry() {
        let first = responder_user_prompt(&input(None, 0), None);
        assert!(!first.contains("CORRECTIONS"));

        let fb = CorrectionFeedback::reject(true, false, "text discusses tax, voice discusses rankings");
        let retry = responder_user_prompt(&input(Some(fb), 1), None);
        assert!(retry.contains("Attempt 2/3"));
        assert!(retry.contains("text discusses tax"));
    }

    #[test]
    fn test_evidence_block_variants() {
        let empty = EvidenceBundle::retrieved("q", vec![]);
        assert!(evidence_block(Some(&empty)).contains(NO_EVIDENCE));

        let down = EvidenceBundle::unavailable("q");
        assert!(evidence_block(Some(&down)).contains("technical issue"));

        let hits = EvidenceBundle::retrieved("q", vec!["Switzerland ranks first".to_string()]);
        assert!(evidence_block(Some(&hits)).contains("[Source 1]"));
    }

    const RULES: [&str; 4] = ["GREETING:", "GENERAL QUESTION:", "TOPIC QUESTION: STRICT", "OUT OF SCOPE:"];

    fn assert_only_rule(intent: IntentTag, expected: &str) {
        let prompt = validator_system_prompt(intent);
        assert!(prompt.contains(expected), "{:?} prompt lacks {}", intent, expected);
        for other in RULES.iter().filter(|r| **r != expected) {
            assert!(!prompt.contains(other), "{:?} prompt leaks {}", intent, other);
        }
        assert!(prompt.contains("## CONSISTENCY"));
    }

    #[test]
    fn test_validator_prompt_greet() {
        assert_only_rule(IntentTag::Greet, "GREETING:");
        assert!(validator_system_prompt(IntentTag::Greet).contains("send_to_ui should be false"));
    }

    #[test]
    fn test_validator_prompt_general_question() {
        assert_only_rule(IntentTag::GeneralQuestion, "GENERAL QUESTION:");
    }

    #[test]
    fn test_validator_prompt_topic_question() {
        assert_only_rule(IntentTag::TopicQuestion, "TOPIC QUESTION: STRICT");
        assert!(validator_system_prompt(IntentTag::TopicQuestion).contains("technical issue"));
    }

    #[test]
    fn test_validator_prompt_out_of_scope() {
        assert_only_rule(IntentTag::OutOfScope, "OUT OF SCOPE:");
    }
}
