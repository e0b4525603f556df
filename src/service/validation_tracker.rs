//! Per-run validation accounting.
//!
//! Every fetched record is either valid or invalid; duplicates are counted on
//! the side and never enter the rate.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::models::EntityType;
use crate::domain::stats::round2;

pub const DEFAULT_THRESHOLD: f64 = 98.0;
pub const DEFAULT_MAX_STORED_ERRORS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationMetrics {
    pub total_fetched: u64,
    pub valid_records: u64,
    pub invalid_records: u64,
    pub duplicates_skipped: u64,
    pub validation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrorDetail {
    pub entity: EntityType,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub validation_rate: f64,
    pub meets_threshold: bool,
    pub total_records: u64,
    pub valid_records: u64,
    pub invalid_records: u64,
    pub duplicates_skipped: u64,
    pub errors_by_entity: BTreeMap<EntityType, u64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct EntityCounts {
    valid: u64,
    invalid: u64,
}

/// Where phases report record outcomes.
///
/// Implemented by the tracker itself and by the orchestrator, which forwards
/// to its single tracker instance.
pub trait ValidationReporter: Send + Sync {
    fn record_valid(&self, entity: EntityType);
    fn record_invalid(&self, entity: EntityType, message: &str, context: Option<&str>);
    fn record_duplicate_skipped(&self, entity: EntityType);
}

#[derive(Debug, Clone)]
pub struct ValidationMetricsTracker {
    valid: u64,
    invalid: u64,
    duplicates: u64,
    by_entity: BTreeMap<EntityType, EntityCounts>,
    duplicates_by_entity: BTreeMap<EntityType, u64>,
    errors: Vec<ValidationErrorDetail>,
    max_stored_errors: usize,
    threshold: f64,
}

impl Default for ValidationMetricsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MAX_STORED_ERRORS)
    }
}

impl ValidationMetricsTracker {
    pub fn new(threshold: f64, max_stored_errors: usize) -> Self {
        Self {
            valid: 0,
            invalid: 0,
            duplicates: 0,
            by_entity: BTreeMap::new(),
            duplicates_by_entity: BTreeMap::new(),
            errors: Vec::new(),
            max_stored_errors,
            threshold,
        }
    }

    pub fn record_valid(&mut self, entity: EntityType) {
        self.valid += 1;
        self.by_entity.entry(entity).or_default().valid += 1;
    }

    /// Details beyond `max_stored_errors` are dropped; the counters still move.
    pub fn record_invalid(&mut self, entity: EntityType, message: &str, context: Option<&str>) {
        self.invalid += 1;
        self.by_entity.entry(entity).or_default().invalid += 1;

        if self.errors.len() < self.max_stored_errors {
            self.errors.push(ValidationErrorDetail {
                entity,
                message: message.to_string(),
                context: context.map(str::to_string),
            });
        }
    }

    pub fn record_duplicate_skipped(&mut self, entity: EntityType) {
        self.duplicates += 1;
        *self.duplicates_by_entity.entry(entity).or_default() += 1;
    }

    /// valid / (valid + invalid) × 100, two decimals; 100 when nothing was fetched.
    pub fn validation_rate(&self) -> f64 {
        rate(self.valid, self.invalid)
    }

    pub fn get_metrics(&self) -> ValidationMetrics {
        ValidationMetrics {
            total_fetched: self.valid + self.invalid,
            valid_records: self.valid,
            invalid_records: self.invalid,
            duplicates_skipped: self.duplicates,
            validation_rate: self.validation_rate(),
        }
    }

    pub fn get_summary(&self) -> ValidationSummary {
        let rate = self.validation_rate();
        ValidationSummary {
            validation_rate: rate,
            meets_threshold: rate >= self.threshold,
            total_records: self.valid + self.invalid,
            valid_records: self.valid,
            invalid_records: self.invalid,
            duplicates_skipped: self.duplicates,
            errors_by_entity: self
                .by_entity
                .iter()
                .filter(|(_, c)| c.invalid > 0)
                .map(|(e, c)| (*e, c.invalid))
                .collect(),
        }
    }

    /// Rate over one entity family's own counters. `None` if it saw no records.
    pub fn get_validation_rate_by_entity(&self, entity: EntityType) -> Option<f64> {
        self.by_entity
            .get(&entity)
            .filter(|c| c.valid + c.invalid > 0)
            .map(|c| rate(c.valid, c.invalid))
    }

    pub fn duplicates_for(&self, entity: EntityType) -> u64 {
        self.duplicates_by_entity.get(&entity).copied().unwrap_or(0)
    }

    pub fn errors(&self) -> &[ValidationErrorDetail] {
        &self.errors
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.valid = 0;
        self.invalid = 0;
        self.duplicates = 0;
        self.by_entity.clear();
        self.duplicates_by_entity.clear();
        self.errors.clear();
    }
}

fn rate(valid: u64, invalid: u64) -> f64 {
    let total = valid + invalid;
    if total == 0 {
        return 100.0;
    }
    round2(valid as f64 / total as f64 * 100.0)
}
