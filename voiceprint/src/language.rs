//! Spoken language identification results and label handling.

use std::fmt;

use crate::error::VoiceprintError;

/// Language code reported when detection fails.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Language codes routed to the CN-Celeb speaker model.
pub const DEFAULT_ASIAN_LANGUAGES: &[&str] = &["zh", "ja", "ko", "th", "vi", "yue", "cmn"];

/// Classifies the spoken language of a clip.
///
/// Implementations must be safe for concurrent use.
pub trait LanguageIdentifier: Send + Sync {
    fn identify(&self, samples: &[f32]) -> Result<Detection, VoiceprintError>;
}

/// Detected language and the classifier's probability for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub language: String,
    /// Probability of `language`, in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(language: impl Into<String>, confidence: f32) -> Self {
        Self {
            language: language.into(),
            confidence,
        }
    }

    /// The fallback result when detection fails.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LANGUAGE, 0.0)
    }

    pub fn is_unknown(&self) -> bool {
        self.language == UNKNOWN_LANGUAGE
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2})", self.language, self.confidence)
    }
}

/// Extracts the language code from a classifier label.
///
/// VoxLingua107 labels look like `"zh: Chinese"`; the code is the part
/// before the colon. Labels without a colon are returned trimmed.
pub fn language_code(label: &str) -> &str {
    match label.split_once(':') {
        Some((code, _)) => code.trim(),
        None => label.trim(),
    }
}

/// Numerically stable softmax.
///
/// Applied to log-probabilities it returns the original probabilities,
/// so it is safe on either logits or log-softmax outputs.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f64> = logits.iter().map(|&x| ((x - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| (e / sum) as f32).collect()
}

/// Returns the index and value of the largest element.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Parses a label list.
///
/// Two formats are accepted:
///
/// - one label per line, in class index order;
/// - a label encoder dump with lines like `'zh: Chinese' => 98`.
///
/// Parsing stops at the first separator line (`=====`), after which
/// encoder dumps store bookkeeping entries such as `'starting_index' => 0`.
pub fn parse_labels(text: &str) -> Result<Vec<String>, VoiceprintError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .take_while(|l| !(l.len() >= 3 && l.chars().all(|c| c == '=')))
        .filter(|l| !l.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(VoiceprintError::Labels("no labels".into()));
    }
    if !lines.iter().any(|l| l.contains("=>")) {
        return Ok(lines.into_iter().map(str::to_string).collect());
    }

    let mut indexed: Vec<(usize, String)> = Vec::with_capacity(lines.len());
    for line in lines {
        let (label, index) = line
            .rsplit_once("=>")
            .ok_or_else(|| VoiceprintError::Labels(format!("expected `=>` in line {line:?}")))?;
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| VoiceprintError::Labels(format!("bad index in line {line:?}")))?;
        indexed.push((index, unquote(label.trim()).to_string()));
    }

    let len = indexed.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
    let mut labels = vec![String::new(); len];
    for (i, label) in indexed {
        labels[i] = label;
    }
    if let Some(gap) = labels.iter().position(String::is_empty) {
        return Err(VoiceprintError::Labels(format!("missing label for index {gap}")));
    }
    Ok(labels)
}

fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_from_voxlingua_label() {
        assert_eq!(language_code("zh: Chinese"), "zh");
        assert_eq!(language_code("en: English"), "en");
        assert_eq!(language_code(" ja "), "ja");
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn softmax_of_log_probs_recovers_probs() {
        let probs = [0.7f32, 0.2, 0.1];
        let logs: Vec<f32> = probs.iter().map(|p| p.ln()).collect();
        for (got, want) in softmax(&logs).iter().zip(probs) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn softmax_all_neg_inf() {
        assert_eq!(softmax(&[f32::NEG_INFINITY; 2]), vec![0.0, 0.0]);
    }

    #[test]
    fn argmax_picks_largest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn parse_plain_labels() {
        let labels = parse_labels("ab: Abkhazian\naf: Afrikaans\n\nam: Amharic\n").unwrap();
        assert_eq!(labels, vec!["ab: Abkhazian", "af: Afrikaans", "am: Amharic"]);
    }

    #[test]
    fn parse_label_encoder_dump() {
        let text = "'af: Afrikaans' => 1\n'ab: Abkhazian' => 0\n================\n'starting_index' => 0\n";
        let labels = parse_labels(text).unwrap();
        assert_eq!(labels, vec!["ab: Abkhazian", "af: Afrikaans"]);
    }

    #[test]
    fn parse_labels_with_gap() {
        assert!(parse_labels("'a' => 0\n'c' => 2\n").is_err());
    }

    #[test]
    fn parse_empty_labels() {
        assert!(parse_labels("\n\n").is_err());
    }

    #[test]
    fn unknown_detection() {
        let d = Detection::unknown();
        assert!(d.is_unknown());
        assert_eq!(d.confidence, 0.0);
        assert_eq!(Detection::new("en", 0.5).to_string(), "en (0.50)");
    }
}
