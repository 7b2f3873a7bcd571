//! Job identity
//!
//! A job is one (model, task, technique) triple. Its artifact path is a
//! pure function of the triple and the batch directory.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::IdentifierError;

/// Joins the three components of an artifact file name.
///
/// Never valid inside an identifier, so distinct triples cannot produce
/// the same file name. Not `_`: underscores occur inside identifiers, so
/// `a_b`+`c`+`d` and `a`+`b_c`+`d` would both join to `a_b_c_d`.
pub const PATH_SEPARATOR: char = '+';

/// Extension of every artifact file
pub const ARTIFACT_EXTENSION: &str = "md";

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn validate(field: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { field });
    }

    if let Some(character) = value.chars().find(|c| !is_identifier_char(*c)) {
        return Err(IdentifierError::InvalidCharacter {
            field,
            value: value.to_string(),
            character,
        });
    }

    Ok(())
}

/// A single unit of work
///
/// Equality and hashing are by value. Fields are private so a `JobSpec`
/// can only exist in validated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobSpec {
    model: String,
    task: String,
    technique: String,
}

impl JobSpec {
    /// Builds a job from its three components
    ///
    /// Each component must be non-empty and match `[A-Za-z0-9_.-]+`.
    pub fn new(
        model: impl Into<String>,
        task: impl Into<String>,
        technique: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let model = model.into();
        let task = task.into();
        let technique = technique.into();

        validate("model", &model)?;
        validate("task", &task)?;
        validate("technique", &technique)?;

        Ok(Self {
            model,
            task,
            technique,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn technique(&self) -> &str {
        &self.technique
    }

    /// Artifact file name without extension: `<model>+<technique>+<task>`
    pub fn stem(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.model,
            self.technique,
            self.task,
            sep = PATH_SEPARATOR
        )
    }

    /// Artifact file name: `<model>+<technique>+<task>.md`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), ARTIFACT_EXTENSION)
    }

    /// Canonical artifact location for this job
    pub fn output_path(&self, root: &Path, batch: Option<&BatchId>) -> PathBuf {
        output_dir(root, batch).join(self.file_name())
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.model, self.task, self.technique)
    }
}

/// Names one batch directory under the output root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(String);

impl BatchId {
    /// Validates a batch id
    ///
    /// Same alphabet as job components; `.` and `..` are rejected because
    /// the batch id becomes a directory name.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate("batch", &value)?;

        if value == "." || value == ".." {
            return Err(IdentifierError::Reserved {
                field: "batch",
                value,
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory holding the artifacts of one batch
pub fn output_dir(root: &Path, batch: Option<&BatchId>) -> PathBuf {
    match batch {
        Some(batch) => root.join(batch.as_str()),
        None => root.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_valid_spec() {
        let spec = JobSpec::new("sonnet", "task_H", "L8_generative_v2").unwrap();
        assert_eq!(spec.model(), "sonnet");
        assert_eq!(spec.task(), "task_H");
        assert_eq!(spec.technique(), "L8_generative_v2");
        assert_eq!(spec.to_string(), "sonnet task_H L8_generative_v2");
    }

    #[test]
    fn test_rejects_empty_component() {
        let err = JobSpec::new("sonnet", "", "L8").unwrap_err();
        assert_eq!(err, IdentifierError::Empty { field: "task" });
    }

    #[test]
    fn test_rejects_path_separators() {
        for bad in ["../etc", "a/b", "a\\b", "a b", "a+b"] {
            let err = JobSpec::new("sonnet", "task_H", bad).unwrap_err();
            assert_eq!(err.field(), "technique", "accepted {bad:?}");
        }
    }

    #[test]
    fn test_output_path_layout() {
        let spec = JobSpec::new("sonnet", "task_H", "L8_generative_v2").unwrap();

        let flat = spec.output_path(Path::new("output"), None);
        assert_eq!(flat, PathBuf::from("output/sonnet+L8_generative_v2+task_H.md"));

        let batch = BatchId::new("round21").unwrap();
        let nested = spec.output_path(Path::new("output"), Some(&batch));
        assert_eq!(
            nested,
            PathBuf::from("output/round21/sonnet+L8_generative_v2+task_H.md")
        );
    }

    #[test]
    fn test_output_path_is_deterministic() {
        let a = JobSpec::new("opus", "task_A", "v4_control").unwrap();
        let b = JobSpec::new("opus", "task_A", "v4_control").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.output_path(Path::new("out"), None),
            b.output_path(Path::new("out"), None)
        );
    }

    #[test]
    fn test_underscores_do_not_collide() {
        // Same characters, different split between components.
        let specs = [
            JobSpec::new("a_b", "c", "d").unwrap(),
            JobSpec::new("a", "c", "b_d").unwrap(),
            JobSpec::new("a", "b_c", "d").unwrap(),
            JobSpec::new("a", "d", "b_c").unwrap(),
        ];
        let names: HashSet<_> = specs.iter().map(JobSpec::file_name).collect();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_batch_id_rejects_relative_dirs() {
        assert!(matches!(
            BatchId::new(".."),
            Err(IdentifierError::Reserved { .. })
        ));
        assert!(BatchId::new(".").is_err());
        assert!(BatchId::new("a/b").is_err());
        assert!(BatchId::new("").is_err());
        assert_eq!(BatchId::new("round_21").unwrap().as_str(), "round_21");
    }
}
