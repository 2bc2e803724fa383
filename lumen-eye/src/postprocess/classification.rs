//! Turning classifier logits into ranked, human readable predictions

use crate::error::VisionError;
use crate::tensor::Matrix;
use std::cmp::Ordering;
use std::fmt;

pub const TOP_CATEGORIES: usize = 5;
pub const ENVIRONMENT_VOTES: usize = 10;
pub const TOP_ATTRIBUTES: usize = 9;

/// Normalized exponential over `logits`.
///
/// `+inf` entries share all of the mass. NaN, or a vector of only `-inf`, is an error.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, VisionError> {
    if logits.is_empty() {
        return Ok(Vec::new());
    }
    if logits.iter().any(|x| x.is_nan()) {
        return Err(VisionError::Processing("Classifier produced NaN scores".to_string()));
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return Err(VisionError::Processing("Every classifier score is -inf".to_string()));
    }
    if max == f32::INFINITY {
        let winners = logits.iter().filter(|&&x| x == f32::INFINITY).count() as f32;
        return Ok(logits
            .iter()
            .map(|&x| if x == f32::INFINITY { 1.0 / winners } else { 0.0 })
            .collect());
    }
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// A score together with its position in the original vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub score: f32,
}

/// All indices ordered by descending score; ties keep index order, NaN sorts last
pub fn rank_descending(scores: &[f32]) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = scores
        .iter()
        .enumerate()
        .map(|(index, &score)| Ranked { index, score })
        .collect();
    ranked.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
    ranked
}

pub fn top_k(scores: &[f32], k: usize) -> Vec<Ranked> {
    let mut ranked = rank_descending(scores);
    ranked.truncate(k);
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Indoor,
    Outdoor,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Indoor => f.write_str("indoor"),
            Environment::Outdoor => f.write_str("outdoor"),
        }
    }
}

/// Average the 0/1 flags of the first [`ENVIRONMENT_VOTES`] ranked categories;
/// below one half is indoor
pub fn vote_environment(flags: &[u8], ranking: &[Ranked]) -> Result<Environment, VisionError> {
    let voters = &ranking[..ranking.len().min(ENVIRONMENT_VOTES)];
    if voters.is_empty() {
        return Err(VisionError::Processing("No categories to vote with".to_string()));
    }
    let mut total = 0.0f32;
    for r in voters {
        let flag = flags.get(r.index).ok_or_else(|| {
            VisionError::Processing(format!("No environment flag for category {}", r.index))
        })?;
        total += *flag as f32;
    }
    let mean = total / voters.len() as f32;
    Ok(if mean < 0.5 { Environment::Indoor } else { Environment::Outdoor })
}

/// Indices of the strongest attributes for a pooled feature vector
pub fn top_attributes(weights: &Matrix, pooled: &[f32], k: usize) -> Result<Vec<usize>, VisionError> {
    let responses = weights.dot_vector(pooled)?;
    Ok(top_k(&responses, k).into_iter().map(|r| r.index).collect())
}

/// One ranked category line
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScore {
    pub probability: f32,
    pub label: String,
}

/// Everything printed for one classified image
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub environment: Option<Environment>,
    pub categories: Vec<CategoryScore>,
    pub attributes: Vec<String>,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(environment) = self.environment {
            writeln!(f, "--TYPE OF ENVIRONMENT:")?;
            writeln!(f, "\t{}", environment)?;
        }
        writeln!(f, "--SCENE CATEGORIES:")?;
        for c in &self.categories {
            writeln!(f, "\t{:.3} -> {}", c.probability, c.label)?;
        }
        if !self.attributes.is_empty() {
            writeln!(f, "--SCENE ATTRIBUTES:")?;
            writeln!(f, "\t {}", self.attributes.join(", "))?;
        }
        Ok(())
    }
}
