//! Prompt templates for question generation and answer synthesis.

/// Marker-format question prompt. `{snippet}` receives the leading CV chunks.
pub const QUESTION_PROMPT: &str = "\
Read the candidate CV excerpt below and write interview questions grounded in it.

Use exactly this layout:
Technical:
1. <question>
2. <question>
3. <question>
4. <question>
5. <question>
Behavioral:
1. <question>
2. <question>
3. <question>
4. <question>
5. <question>

Candidate CV Snippet:
{snippet}";

/// Structured question prompt. `{schema}` receives the JSON schema of the expected object.
pub const STRUCTURED_QUESTION_PROMPT: &str = "\
Read the candidate CV excerpt below and write 5 technical and 5 behavioral interview \
questions grounded in it. Reference concrete skills, projects and responsibilities from the CV.

Respond with a single JSON object matching this schema and nothing else:
{schema}

Candidate CV Snippet:
{snippet}";

/// Answer prompt filled with retrieved passages. `{context}` and `{question}` are replaced.
pub const ANSWER_PROMPT: &str = "\
Use the following pieces of context to answer the question at the end. \
If the context does not contain the answer, say that you don't know rather than inventing one.

{context}

Question: {question}
Helpful Answer:";

/// Appended to a question when a parsed CV is available.
pub const CANDIDATE_BACKGROUND_HEADER: &str = "\n\nCandidate Background:\n";
