//! Prompts sent to the remote analyzer, one per facet.
//! Each asks for a JSON reply whose shape the facet knows how to read.

/// Ask for a JSON array of located errors
pub fn grammar_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following text for grammar, style, and clarity issues.
Return ONLY the errors found in this exact JSON format:
[
  {{
    "type": "grammar|spelling|punctuation|style|clarity",
    "severity": "low|medium|high|critical",
    "position": [start_char, end_char],
    "message": "Description of the error",
    "suggestion": "How to fix it",
    "explanation": "Why this is an error"
  }}
]

Character positions are zero-based offsets into the text below.
If no errors are found, return an empty array [].
Focus on significant errors that affect readability and professionalism.

Text to analyze:
{text}
"#
    )
}

/// Ask for an overall coherence rating plus problem locations
pub fn coherence_prompt(text: &str) -> String {
    format!(
        r#"Analyze the coherence and flow of the following text.

Evaluate:
1. Logical flow between sentences and paragraphs
2. Use of transitions and connecting phrases
3. Consistency of ideas and arguments
4. Overall organization and structure

Return your analysis as JSON:
{{
  "overall_coherence": "excellent|good|fair|poor",
  "main_issues": ["issue1", "issue2"],
  "strengths": ["strength1", "strength2"],
  "specific_improvements": ["improvement1", "improvement2"],
  "problematic_sections": [
    {{
      "location": "paragraph N" or "sentences X-Y",
      "issue": "description of the problem",
      "suggestion": "how to improve"
    }}
  ]
}}

Paragraphs and sentences are numbered from 1.

Text to analyze:
{text}
"#
    )
}

/// Ask how well the text covers the given topics
pub fn relevance_prompt(text: &str, topics: &[String]) -> String {
    format!(
        r#"Analyze how well the following text addresses the topic(s): {topics}

Evaluate:
1. Coverage of key aspects of the topic
2. Depth of treatment
3. Relevance of examples and supporting details
4. Any off-topic sections or digressions

Return your analysis as JSON:
{{
  "overall_relevance": "excellent|good|fair|poor",
  "relevance_percentage": 85,
  "well_covered_aspects": ["aspect1", "aspect2"],
  "missing_aspects": ["aspect1", "aspect2"],
  "off_topic_sections": ["description1"],
  "improvement_suggestions": ["suggestion1", "suggestion2"],
  "key_insights": ["insight1", "insight2"]
}}

Text to analyze:
{text}
"#,
        topics = topics.join(", ")
    )
}
