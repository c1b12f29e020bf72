/// Render the evaluation request for one submitted answer.
///
/// The output-shape instruction is a contract the repair parser is built to
/// work around when violated, not something it trusts blindly.
pub fn build_prompt(question: &str, reference_answer: &str, candidate_answer: &str) -> String {
    format!(
        "You are an experienced interviewer scoring a candidate's practice answer.\n\n\
         Interview Question: {question}\n\n\
         Reference Answer: {reference_answer}\n\n\
         Candidate Answer: {candidate_answer}\n\n\
         Compare the candidate's answer against the reference answer for correctness, \
         completeness, and clarity. Be specific about what was strong and what was missing.\n\n\
         Respond with ONLY a JSON object with exactly two keys:\n\
         - \"rating\": an integer from 1 to 10\n\
         - \"feedback\": a string with your critique\n\
         Do not wrap the JSON in markdown code fences and do not add any text before or after it."
    )
}
