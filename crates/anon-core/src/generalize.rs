//! Generalization and Suppression (k-anonymity)
//!
//! Greedy search over generalization levels: starting from the raw values,
//! repeatedly raise the level of the quasi-identifier whose next step merges
//! the most violating equivalence classes per unit of information loss. While
//! the violating records exceed the suppression allowance any step is taken;
//! once they fit, only steps that lower the violating records are, and the
//! search stops when none does (or no violations remain). The records still
//! violating are then dropped (or redacted).
//!
//! With `early_suppression` the search instead stops as soon as the violating
//! records fit the allowance, trading records for less generalization.
//!
//! Global recoding applies one level per attribute to every record. Local
//! recoding keeps a level vector per record and only generalizes the records
//! of violating classes; it falls back to the global result when it cannot
//! meet the suppression limit. Clustering recoding skips the hierarchies and
//! microaggregates records instead (see [`crate::microaggregation`]).
//!
//! # Example
//!
//! ```ignore
//! use anon_core::generalize::{generalize, KAnonymityConfig};
//! use anon_core::{CancellationToken, HierarchySet, Hierarchy};
//!
//! let hierarchies = HierarchySet::new()
//!     .with(Hierarchy::numeric_bands("age", vec![5.0, 10.0, 20.0])?)
//!     .with(Hierarchy::prefix_mask("zip", 5));
//! let config = KAnonymityConfig::new(vec!["age".into(), "zip".into()], 5)
//!     .with_suppression_limit(0.02);
//!
//! let (anonymized, report) = generalize(&dataset, &config, &hierarchies, &CancellationToken::new())?
//!     .completed()
//!     .expect("not cancelled");
//! println!("levels {:?}, suppressed {}", report.levels, report.suppressed_records);
//! ```

use crate::cancel::{bail_if_cancelled, CancellationToken, Outcome};
use crate::dataset::{Dataset, Value, ValueKey, SUPPRESSED};
use crate::equivalence::{group_rows, ClassVerdict};
use crate::error::{AnonError, BestEffort, ConfigError, PrivacyCriterion, Result};
use crate::hierarchy::{Hierarchy, HierarchySet};
use crate::microaggregation::microaggregate;
use crate::risk::resolve_quasi_identifiers;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What happens to records that still violate the criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// Remove the record; the output records its lineage
    #[default]
    Drop,
    /// Replace its quasi-identifiers with `*` and flag it
    Redact,
}

impl FromStr for SuppressionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(SuppressionMode::Drop),
            "redact" => Ok(SuppressionMode::Redact),
            _ => Err(ConfigError::UnknownName {
                kind: "suppression mode",
                value: s.to_string(),
            }),
        }
    }
}

/// How quasi-identifiers are recoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recoding {
    /// One level per attribute for every record
    #[default]
    Global,
    /// A level vector per record
    Local,
    /// MDAV microaggregation; no hierarchies needed
    Clustering,
}

impl FromStr for Recoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(Recoding::Global),
            "local" => Ok(Recoding::Local),
            "clustering" | "microaggregation" | "mdav" => Ok(Recoding::Clustering),
            _ => Err(ConfigError::UnknownName {
                kind: "recoding",
                value: s.to_string(),
            }),
        }
    }
}

/// Parameters of k-anonymity generalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KAnonymityConfig {
    pub quasi_identifiers: Vec<String>,
    pub k: usize,
    /// Fraction of records that may be suppressed, in [0, 1]
    #[serde(default)]
    pub suppression_limit: f64,
    /// Highest level per attribute (defaults to the hierarchy height)
    #[serde(default)]
    pub max_levels: BTreeMap<String, usize>,
    #[serde(default)]
    pub suppression: SuppressionMode,
    #[serde(default)]
    pub recoding: Recoding,
    /// Stop generalizing as soon as the violations fit the suppression limit
    #[serde(default)]
    pub early_suppression: bool,
}

impl KAnonymityConfig {
    pub fn new(quasi_identifiers: Vec<String>, k: usize) -> Self {
        Self {
            quasi_identifiers,
            k,
            suppression_limit: 0.0,
            max_levels: BTreeMap::new(),
            suppression: SuppressionMode::default(),
            recoding: Recoding::default(),
            early_suppression: false,
        }
    }

    pub fn with_suppression_limit(mut self, limit: f64) -> Self {
        self.suppression_limit = limit;
        self
    }

    /// Cap the generalization level of one attribute
    pub fn with_max_level(mut self, attribute: impl Into<String>, level: usize) -> Self {
        self.max_levels.insert(attribute.into(), level);
        self
    }

    pub fn with_suppression_mode(mut self, mode: SuppressionMode) -> Self {
        self.suppression = mode;
        self
    }

    pub fn with_recoding(mut self, recoding: Recoding) -> Self {
        self.recoding = recoding;
        self
    }

    pub fn with_early_suppression(mut self, early: bool) -> Self {
        self.early_suppression = early;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(AnonError::invalid("k", 0, "must be at least 1"));
        }
        validate_suppression_limit(self.suppression_limit)
    }
}

pub(crate) fn validate_suppression_limit(limit: f64) -> Result<()> {
    if !limit.is_finite() || !(0.0..=1.0).contains(&limit) {
        return Err(AnonError::invalid("suppression_limit", limit, "must be in [0, 1]"));
    }
    Ok(())
}

/// Records the suppression limit allows out of `records`
pub(crate) fn suppression_allowance(limit: f64, records: usize) -> usize {
    (limit * records as f64 + 1e-9).floor() as usize
}

/// Outcome of k-anonymity generalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralizationReport {
    pub quasi_identifiers: Vec<String>,
    pub k: usize,
    pub suppression_limit: f64,
    pub suppression: SuppressionMode,
    pub recoding: Recoding,
    pub early_suppression: bool,
    /// Level caps the search ran with
    pub max_levels: BTreeMap<String, usize>,
    /// Final level per attribute (the highest record level under local recoding)
    pub levels: BTreeMap<String, usize>,
    pub suppressed_records: usize,
    /// Generalization steps taken by the greedy search
    pub steps: usize,
    /// Clusters formed by microaggregation
    pub clusters: Option<usize>,
    /// Classes at the final levels; failing classes were suppressed
    pub classes: Vec<ClassVerdict>,
    /// Mean of level / height over quasi-identifiers (and records, when local)
    pub information_loss: f64,
}

impl GeneralizationReport {
    /// Number of classes that failed and were suppressed
    pub fn suppressed_classes(&self) -> usize {
        self.classes.iter().filter(|c| !c.satisfied).count()
    }
}

/// Per-class privacy test applied during the search
pub(crate) trait ClassCriterion: Sync {
    fn criterion(&self) -> PrivacyCriterion;

    /// Measure of the class and whether it satisfies the criterion
    fn evaluate(&self, rows: &[usize]) -> (f64, bool);
}

/// k-anonymity: class size at least k
pub(crate) struct MinClassSize(pub(crate) usize);

impl ClassCriterion for MinClassSize {
    fn criterion(&self) -> PrivacyCriterion {
        PrivacyCriterion::KAnonymity { k: self.0 }
    }

    fn evaluate(&self, rows: &[usize]) -> (f64, bool) {
        (rows.len() as f64, rows.len() >= self.0)
    }
}

/// Generalize and suppress until every retained class has at least k records
pub fn generalize(
    dataset: &Dataset,
    config: &KAnonymityConfig,
    hierarchies: &HierarchySet,
    cancel: &CancellationToken,
) -> Result<Outcome<(Dataset, GeneralizationReport)>> {
    config.validate()?;
    if config.recoding == Recoding::Clustering {
        return microaggregate(dataset, config, cancel);
    }
    let mut lattice = Lattice::new(dataset, &config.quasi_identifiers, hierarchies, &config.max_levels)?;
    let options = SearchOptions {
        allowance: suppression_allowance(config.suppression_limit, lattice.record_count()),
        early_suppression: config.early_suppression,
        recoding: config.recoding,
        suppression: config.suppression,
    };
    let start = vec![0; config.quasi_identifiers.len()];

    let result = match anonymize(&mut lattice, start, &MinClassSize(config.k), &options, cancel)? {
        Outcome::Completed(result) => result,
        Outcome::Cancelled => return Ok(Outcome::Cancelled),
    };

    info!(
        k = config.k,
        levels = ?result.levels,
        suppressed = result.suppressed,
        steps = result.steps,
        "k-anonymity satisfied"
    );

    let report = GeneralizationReport {
        quasi_identifiers: config.quasi_identifiers.clone(),
        k: config.k,
        suppression_limit: config.suppression_limit,
        suppression: config.suppression,
        recoding: config.recoding,
        early_suppression: config.early_suppression,
        max_levels: config.max_levels.clone(),
        levels: result.levels,
        suppressed_records: result.suppressed,
        steps: result.steps,
        clusters: None,
        classes: result.classes,
        information_loss: result.information_loss,
    };
    Ok(Outcome::Completed((result.dataset, report)))
}

/// Recode quasi-identifiers at fixed levels, without suppression
///
/// Attributes missing from `levels` stay at level 0.
pub fn apply_levels(
    dataset: &Dataset,
    quasi_identifiers: &[String],
    hierarchies: &HierarchySet,
    levels: &BTreeMap<String, usize>,
) -> Result<Dataset> {
    let mut lattice = Lattice::new(dataset, quasi_identifiers, hierarchies, &BTreeMap::new())?;
    for name in levels.keys() {
        if !quasi_identifiers.contains(name) {
            return Err(ConfigError::UnknownAttribute(name.clone()).into());
        }
    }
    let levels: Vec<usize> = quasi_identifiers
        .iter()
        .enumerate()
        .map(|(q, name)| levels.get(name).copied().unwrap_or(0).min(lattice.height(q)))
        .collect();
    for (q, &level) in levels.iter().enumerate() {
        lattice.ensure_level(q, level)?;
    }
    let keep = vec![false; dataset.len()];
    Ok(lattice.recode(|_, q| levels[q], &keep, SuppressionMode::Drop))
}

/// Result of a completed anonymization pass
pub(crate) struct Anonymization {
    pub(crate) dataset: Dataset,
    pub(crate) levels: BTreeMap<String, usize>,
    pub(crate) suppressed: usize,
    pub(crate) steps: usize,
    pub(crate) classes: Vec<ClassVerdict>,
    pub(crate) information_loss: f64,
}

/// Limits and modes shared by the global and local searches
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchOptions {
    /// Records the suppression limit allows
    pub(crate) allowance: usize,
    pub(crate) early_suppression: bool,
    pub(crate) recoding: Recoding,
    pub(crate) suppression: SuppressionMode,
}

impl SearchOptions {
    /// Whether the search is done with `violating` records left
    fn settled(&self, violating: usize) -> bool {
        violating == 0 || (self.early_suppression && violating <= self.allowance)
    }
}

/// Search from `start`, then suppress the remaining violations
pub(crate) fn anonymize(
    lattice: &mut Lattice<'_>,
    start: Vec<usize>,
    criterion: &dyn ClassCriterion,
    options: &SearchOptions,
    cancel: &CancellationToken,
) -> Result<Outcome<Anonymization>> {
    let allowance = options.allowance;
    let global = match lattice.search(start, criterion, options, cancel)? {
        Outcome::Completed(global) => global,
        Outcome::Cancelled => return Ok(Outcome::Cancelled),
    };

    if options.recoding == Recoding::Local {
        match lattice.search_local(criterion, options, cancel)? {
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
            Outcome::Completed(Some(local)) => {
                return Ok(Outcome::Completed(lattice.finish_local(local, options.suppression)));
            }
            Outcome::Completed(None) => {
                debug!("local recoding cannot meet the suppression limit, using global levels");
            }
        }
    }

    if global.evaluation.violating_records > allowance {
        let best = lattice.best_effort(&global, criterion, allowance);
        warn!(%best, "privacy criterion unattainable");
        return Err(AnonError::Unattainable(Box::new(best)));
    }
    Ok(Outcome::Completed(lattice.finish_global(global, options.suppression)))
}

/// Classes of one partition with their verdicts
pub(crate) struct Evaluation {
    groups: Vec<(Vec<u32>, Vec<usize>)>,
    verdicts: Vec<(f64, bool)>,
    pub(crate) violating_classes: usize,
    pub(crate) violating_records: usize,
}

impl Evaluation {
    fn new(groups: Vec<(Vec<u32>, Vec<usize>)>, criterion: &dyn ClassCriterion) -> Self {
        let verdicts: Vec<(f64, bool)> = groups.iter().map(|(_, rows)| criterion.evaluate(rows)).collect();
        let mut violating_classes = 0;
        let mut violating_records = 0;
        for ((_, rows), (_, pass)) in groups.iter().zip(&verdicts) {
            if !pass {
                violating_classes += 1;
                violating_records += rows.len();
            }
        }
        Evaluation {
            groups,
            verdicts,
            violating_classes,
            violating_records,
        }
    }

    /// Per dataset row: true when the row sits in a failing class
    fn violating_mask(&self, rows: usize) -> Vec<bool> {
        let mut mask = vec![false; rows];
        for ((_, members), (_, pass)) in self.groups.iter().zip(&self.verdicts) {
            if !pass {
                for &r in members {
                    mask[r] = true;
                }
            }
        }
        mask
    }
}

/// Violating classes and records of a partition
fn count_violating(groups: &[(Vec<u32>, Vec<usize>)], criterion: &dyn ClassCriterion) -> (usize, usize) {
    groups
        .iter()
        .filter(|(_, rows)| !criterion.evaluate(rows).1)
        .fold((0, 0), |(classes, records), (_, rows)| (classes + 1, records + rows.len()))
}

/// A scored candidate step
#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    attribute: usize,
    score: f64,
    /// Violating records after the step
    violating_records: usize,
}

/// Steps worth taking from a state with `violating` records
///
/// Above the allowance every step qualifies; within it only steps that lower
/// the violating records do.
fn eligible_steps(steps: Vec<Step>, violating: usize, allowance: usize) -> Vec<Step> {
    if violating > allowance {
        return steps;
    }
    steps.into_iter().filter(|s| s.violating_records < violating).collect()
}

pub(crate) struct GlobalSearch {
    pub(crate) levels: Vec<usize>,
    pub(crate) steps: usize,
    pub(crate) evaluation: Evaluation,
}

pub(crate) struct LocalSearch {
    row_levels: Vec<Vec<usize>>,
    steps: usize,
    evaluation: Evaluation,
}

/// Interned values of one quasi-identifier, computed level by level
#[derive(Default)]
struct ValueColumn {
    /// ids[level][row]
    ids: Vec<Vec<u32>>,
    values: Vec<Value>,
    lookup: HashMap<ValueKey, u32>,
}

impl ValueColumn {
    fn intern(&mut self, value: Value) -> u32 {
        let key = value.key();
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = self.values.len() as u32;
        self.values.push(value);
        self.lookup.insert(key, id);
        id
    }
}

/// Generalization state over the quasi-identifiers of one dataset
pub(crate) struct Lattice<'a> {
    dataset: &'a Dataset,
    /// Rows taking part in the search (not already suppressed)
    rows: Vec<usize>,
    names: Vec<String>,
    qis: Vec<usize>,
    hierarchies: Vec<&'a Hierarchy>,
    max_levels: Vec<usize>,
    columns: Vec<ValueColumn>,
}

impl<'a> Lattice<'a> {
    pub(crate) fn new(
        dataset: &'a Dataset,
        names: &[String],
        hierarchies: &'a HierarchySet,
        max_levels: &BTreeMap<String, usize>,
    ) -> Result<Self> {
        let qis = resolve_quasi_identifiers(dataset, names)?;
        for name in max_levels.keys() {
            if !names.contains(name) {
                return Err(ConfigError::UnknownAttribute(name.clone()).into());
            }
        }

        let mut resolved = Vec::with_capacity(names.len());
        let mut caps = Vec::with_capacity(names.len());
        for name in names {
            let hierarchy = hierarchies.require(name)?;
            let cap = max_levels
                .get(name)
                .map_or(hierarchy.height(), |m| (*m).min(hierarchy.height()));
            resolved.push(hierarchy);
            caps.push(cap);
        }

        let mut lattice = Lattice {
            dataset,
            rows: dataset.retained_rows().collect(),
            names: names.to_vec(),
            qis,
            hierarchies: resolved,
            max_levels: caps,
            columns: names.iter().map(|_| ValueColumn::default()).collect(),
        };
        for q in 0..names.len() {
            lattice.ensure_level(q, 0)?;
        }
        Ok(lattice)
    }

    /// Records taking part in the search
    pub(crate) fn record_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> &[usize] {
        &self.rows
    }

    fn width(&self) -> usize {
        self.qis.len()
    }

    fn height(&self, q: usize) -> usize {
        self.hierarchies[q].height()
    }

    /// Compute values of attribute `q` up to `level`
    fn ensure_level(&mut self, q: usize, level: usize) -> Result<()> {
        let dataset = self.dataset;
        let hierarchy = self.hierarchies[q];
        let column = self.qis[q];
        let interned = &mut self.columns[q];
        while interned.ids.len() <= level {
            let current = interned.ids.len();
            let mut ids = Vec::with_capacity(dataset.len());
            for row in 0..dataset.len() {
                let value = if dataset.is_suppressed(row) {
                    Value::Text(SUPPRESSED.to_string())
                } else {
                    hierarchy.generalize(dataset.value(row, column), current)?
                };
                ids.push(interned.intern(value));
            }
            interned.ids.push(ids);
        }
        Ok(())
    }

    fn value(&self, q: usize, level: usize, row: usize) -> &Value {
        let column = &self.columns[q];
        &column.values[column.ids[level][row] as usize]
    }

    fn key(&self, row: usize, levels: &[usize]) -> Vec<u32> {
        levels
            .iter()
            .enumerate()
            .map(|(q, &level)| self.columns[q].ids[level][row])
            .collect()
    }

    fn partition(&self, levels: &[usize]) -> Vec<(Vec<u32>, Vec<usize>)> {
        group_rows(self.rows.iter().map(|&r| (r, self.key(r, levels))))
    }

    fn partition_local(&self, row_levels: &[Vec<usize>]) -> Vec<(Vec<u32>, Vec<usize>)> {
        group_rows(self.rows.iter().map(|&r| (r, self.key(r, &row_levels[r]))))
    }

    /// Greedy global search from `levels`
    ///
    /// Stops when no violations remain, when within the allowance no step
    /// lowers the violating records, or when no attribute can be raised
    /// further; the caller inspects the final evaluation.
    pub(crate) fn search(
        &mut self,
        mut levels: Vec<usize>,
        criterion: &dyn ClassCriterion,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Outcome<GlobalSearch>> {
        for (q, level) in levels.iter_mut().enumerate() {
            *level = (*level).min(self.max_levels[q]);
            self.ensure_level(q, *level)?;
        }
        let mut steps = 0;
        loop {
            bail_if_cancelled!(cancel);
            let evaluation = Evaluation::new(self.partition(&levels), criterion);
            if options.settled(evaluation.violating_records) {
                return Ok(Outcome::Completed(GlobalSearch { levels, steps, evaluation }));
            }

            let candidates: Vec<usize> = (0..self.width())
                .filter(|&q| levels[q] < self.max_levels[q])
                .collect();
            if candidates.is_empty() {
                debug!(violating_records = evaluation.violating_records, "generalization levels exhausted");
                return Ok(Outcome::Completed(GlobalSearch { levels, steps, evaluation }));
            }
            for &q in &candidates {
                self.ensure_level(q, levels[q] + 1)?;
            }

            let scored = self.score_candidates(&candidates, &levels, evaluation.violating_classes, criterion);
            let eligible = eligible_steps(scored, evaluation.violating_records, options.allowance);
            let Some(best) = pick_step(&eligible, |q| levels[q]) else {
                debug!(
                    violating_records = evaluation.violating_records,
                    "no generalization step lowers the violations"
                );
                return Ok(Outcome::Completed(GlobalSearch { levels, steps, evaluation }));
            };
            levels[best] += 1;
            steps += 1;
            debug!(
                attribute = %self.names[best],
                level = levels[best],
                violating_classes = evaluation.violating_classes,
                violating_records = evaluation.violating_records,
                "generalization step"
            );
        }
    }

    #[cfg(feature = "parallel")]
    fn score_candidates(
        &self,
        candidates: &[usize],
        levels: &[usize],
        current: usize,
        criterion: &dyn ClassCriterion,
    ) -> Vec<Step> {
        use rayon::prelude::*;

        candidates
            .par_iter()
            .map(|&q| self.step_score(q, levels, current, criterion))
            .collect()
    }

    /// Fallback when parallel feature is disabled
    #[cfg(not(feature = "parallel"))]
    fn score_candidates(
        &self,
        candidates: &[usize],
        levels: &[usize],
        current: usize,
        criterion: &dyn ClassCriterion,
    ) -> Vec<Step> {
        candidates
            .iter()
            .map(|&q| self.step_score(q, levels, current, criterion))
            .collect()
    }

    /// Violating classes merged away per unit of information loss (1 / height)
    fn step_score(&self, q: usize, levels: &[usize], current: usize, criterion: &dyn ClassCriterion) -> Step {
        let mut trial = levels.to_vec();
        trial[q] += 1;
        let (classes, records) = count_violating(&self.partition(&trial), criterion);
        Step {
            attribute: q,
            score: (current as f64 - classes as f64) * self.height(q) as f64,
            violating_records: records,
        }
    }

    /// Per-record search; `None` when the allowance cannot be met
    ///
    /// Stops under the same rules as [`Lattice::search`].
    pub(crate) fn search_local(
        &mut self,
        criterion: &dyn ClassCriterion,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Option<LocalSearch>>> {
        let mut row_levels = vec![vec![0usize; self.width()]; self.dataset.len()];
        let mut steps = 0;
        loop {
            bail_if_cancelled!(cancel);
            let evaluation = Evaluation::new(self.partition_local(&row_levels), criterion);
            let within = evaluation.violating_records <= options.allowance;
            if options.settled(evaluation.violating_records) {
                return Ok(Outcome::Completed(Some(LocalSearch {
                    row_levels,
                    steps,
                    evaluation,
                })));
            }

            let mask = evaluation.violating_mask(self.dataset.len());
            let violating: Vec<usize> = self.rows.iter().copied().filter(|&r| mask[r]).collect();
            let mut candidates = Vec::new();
            for q in 0..self.width() {
                let highest = violating.iter().map(|&r| row_levels[r][q]).max().unwrap_or(0);
                if violating.iter().any(|&r| row_levels[r][q] < self.max_levels[q]) {
                    self.ensure_level(q, (highest + 1).min(self.max_levels[q]))?;
                    candidates.push(q);
                }
            }
            // a stuck search succeeds only within the allowance
            let settle = |row_levels: Vec<Vec<usize>>,
                          evaluation: Evaluation|
             -> Result<Outcome<Option<LocalSearch>>> {
                let local = LocalSearch {
                    row_levels,
                    steps,
                    evaluation,
                };
                Ok(Outcome::Completed(within.then_some(local)))
            };
            if candidates.is_empty() {
                return settle(row_levels, evaluation);
            }

            let scored: Vec<Step> = candidates
                .iter()
                .map(|&q| {
                    let mut trial = row_levels.clone();
                    self.raise_rows(&mut trial, &violating, q);
                    let (classes, records) = count_violating(&self.partition_local(&trial), criterion);
                    let benefit = evaluation.violating_classes as f64 - classes as f64;
                    Step {
                        attribute: q,
                        score: benefit * self.height(q) as f64,
                        violating_records: records,
                    }
                })
                .collect();
            let eligible = eligible_steps(scored, evaluation.violating_records, options.allowance);
            let Some(best) = pick_step(&eligible, |q| {
                violating.iter().map(|&r| row_levels[r][q]).max().unwrap_or(0)
            }) else {
                return settle(row_levels, evaluation);
            };
            self.raise_rows(&mut row_levels, &violating, best);
            steps += 1;
            debug!(
                attribute = %self.names[best],
                records = violating.len(),
                "local recoding step"
            );
        }
    }

    fn raise_rows(&self, row_levels: &mut [Vec<usize>], rows: &[usize], q: usize) {
        for &r in rows {
            let level = &mut row_levels[r][q];
            *level = (*level + 1).min(self.max_levels[q]);
        }
    }

    pub(crate) fn finish_global(&self, search: GlobalSearch, mode: SuppressionMode) -> Anonymization {
        let mask = search.evaluation.violating_mask(self.dataset.len());
        let levels = &search.levels;
        let dataset = self.recode(|_, q| levels[q], &mask, mode);
        let information_loss = if self.width() == 0 {
            0.0
        } else {
            (0..self.width())
                .map(|q| levels[q] as f64 / self.height(q) as f64)
                .sum::<f64>()
                / self.width() as f64
        };
        self.finish(
            dataset,
            self.level_map(levels),
            search.steps,
            &search.evaluation,
            information_loss,
        )
    }

    fn finish_local(&self, search: LocalSearch, mode: SuppressionMode) -> Anonymization {
        let mask = search.evaluation.violating_mask(self.dataset.len());
        let row_levels = &search.row_levels;
        let dataset = self.recode(|r, q| row_levels[r][q], &mask, mode);

        let highest: Vec<usize> = (0..self.width())
            .map(|q| self.rows.iter().map(|&r| row_levels[r][q]).max().unwrap_or(0))
            .collect();
        let cells = (self.rows.len() * self.width()).max(1) as f64;
        let information_loss = self
            .rows
            .iter()
            .flat_map(|&r| (0..self.width()).map(move |q| (r, q)))
            .map(|(r, q)| row_levels[r][q] as f64 / self.height(q) as f64)
            .sum::<f64>()
            / cells;
        self.finish(
            dataset,
            self.level_map(&highest),
            search.steps,
            &search.evaluation,
            information_loss,
        )
    }

    fn finish(
        &self,
        dataset: Dataset,
        levels: BTreeMap<String, usize>,
        steps: usize,
        evaluation: &Evaluation,
        information_loss: f64,
    ) -> Anonymization {
        let suppressed = evaluation.violating_records;
        if suppressed > 0 {
            warn!(
                records = suppressed,
                classes = evaluation.violating_classes,
                "suppressing records in violating classes"
            );
        }
        Anonymization {
            dataset,
            levels,
            suppressed,
            steps,
            classes: self.verdicts(evaluation),
            information_loss,
        }
    }

    pub(crate) fn best_effort(
        &self,
        search: &GlobalSearch,
        criterion: &dyn ClassCriterion,
        allowance: usize,
    ) -> BestEffort {
        BestEffort {
            criterion: criterion.criterion(),
            levels: self.level_map(&search.levels),
            violating_classes: self
                .verdicts(&search.evaluation)
                .into_iter()
                .filter(|v| !v.satisfied)
                .collect(),
            violating_records: search.evaluation.violating_records,
            suppression_allowed: allowance,
        }
    }

    fn level_map(&self, levels: &[usize]) -> BTreeMap<String, usize> {
        self.names.iter().cloned().zip(levels.iter().copied()).collect()
    }

    fn verdicts(&self, evaluation: &Evaluation) -> Vec<ClassVerdict> {
        evaluation
            .groups
            .iter()
            .zip(&evaluation.verdicts)
            .map(|((key, rows), (measure, satisfied))| ClassVerdict {
                values: key
                    .iter()
                    .enumerate()
                    .map(|(q, &id)| self.columns[q].values[id as usize].label())
                    .collect(),
                size: rows.len(),
                measure: *measure,
                satisfied: *satisfied,
            })
            .collect()
    }

    /// Build the output dataset; `violating[row]` rows are suppressed per `mode`
    fn recode<F>(&self, level_of: F, violating: &[bool], mode: SuppressionMode) -> Dataset
    where
        F: Fn(usize, usize) -> usize,
    {
        let source = self.dataset;
        let mut rows = Vec::with_capacity(source.len());
        let mut lineage = Vec::with_capacity(source.len());
        let mut flags = Vec::with_capacity(source.len());
        let mut dropped = false;

        for (r, original) in source.rows().iter().enumerate() {
            let mut row = original.clone();
            let flagged = if source.is_suppressed(r) {
                true
            } else if violating[r] {
                match mode {
                    SuppressionMode::Drop => {
                        dropped = true;
                        continue;
                    }
                    SuppressionMode::Redact => {
                        for &c in &self.qis {
                            row[c] = Value::Text(SUPPRESSED.to_string());
                        }
                        true
                    }
                }
            } else {
                for (q, &c) in self.qis.iter().enumerate() {
                    let level = level_of(r, q);
                    if level > 0 {
                        row[c] = self.value(q, level, r).clone();
                    }
                }
                false
            };
            rows.push(row);
            lineage.push(source.source_row(r));
            flags.push(flagged);
        }

        let lineage = if dropped {
            Some(lineage)
        } else {
            source.lineage().map(<[usize]>::to_vec)
        };
        Dataset::derived(source.schema().to_vec(), rows, lineage, flags)
    }
}

/// Highest score wins; ties go to the lowest current level, then declaration order
fn pick_step(steps: &[Step], level_of: impl Fn(usize) -> usize) -> Option<usize> {
    let (first, rest) = steps.split_first()?;
    let mut best = first;
    for step in rest {
        let tie = step.score == best.score && level_of(step.attribute) < level_of(best.attribute);
        if step.score > best.score || tie {
            best = step;
        }
    }
    Some(best.attribute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attribute, AttributeRole, AttributeType};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn people(rows: &[(i64, &str)]) -> Dataset {
        let schema = vec![
            Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = rows
            .iter()
            .map(|(a, z)| vec![Value::from(*a), Value::from(*z), Value::from("flu")])
            .collect();
        Dataset::new(schema, rows).unwrap()
    }

    fn hierarchies() -> HierarchySet {
        HierarchySet::new()
            .with(Hierarchy::numeric_bands("age", vec![10.0, 20.0]).unwrap())
            .with(Hierarchy::prefix_mask("zip", 5))
    }

    fn run(dataset: &Dataset, config: &KAnonymityConfig) -> Result<(Dataset, GeneralizationReport)> {
        Ok(generalize(dataset, config, &hierarchies(), &CancellationToken::new())?
            .completed()
            .unwrap())
    }

    #[test]
    fn test_k_one_changes_nothing() {
        let ds = people(&[(30, "02139"), (41, "02141")]);
        let (out, report) = run(&ds, &KAnonymityConfig::new(names(&["age", "zip"]), 1)).unwrap();
        assert_eq!(out, ds);
        assert_eq!(report.steps, 0);
        assert!(report.levels.values().all(|&l| l == 0));
        assert_eq!(report.information_loss, 0.0);
    }

    #[test]
    fn test_generalization_reaches_k() {
        let ds = people(&[
            (31, "02139"),
            (35, "02138"),
            (38, "02139"),
            (42, "02141"),
            (44, "02142"),
            (47, "02141"),
        ]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 3);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(report.suppressed_records, 0);
        assert!(report.classes.iter().all(|c| c.size >= 3 && c.satisfied));
        let classes = crate::equivalence::partition(&out, &[0, 1]);
        assert!(classes.iter().all(|c| c.size() >= 3));
        assert!(report.information_loss > 0.0);
    }

    #[test]
    fn test_suppression_replaces_generalization_within_limit() {
        // one outlier; a 1-record allowance covers it at level 0
        let ds = people(&[
            (30, "02139"),
            (30, "02139"),
            (30, "02139"),
            (30, "02139"),
            (99, "90210"),
        ]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2).with_suppression_limit(0.2);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.suppressed_records, 1);
        assert_eq!(report.suppressed_classes(), 1);
        assert_eq!(out.len(), 4);
        assert_eq!(out.lineage(), Some(&[0usize, 1, 2, 3][..]));
    }

    #[test]
    fn test_redact_mode_flags_rows() {
        let ds = people(&[(30, "02139"), (30, "02139"), (99, "90210")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2)
            .with_suppression_limit(0.5)
            .with_suppression_mode(SuppressionMode::Redact);
        let (out, _) = run(&ds, &config).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.is_suppressed(2));
        assert_eq!(out.value(2, 0), &Value::from("*"));
        assert_eq!(out.value(2, 2), &Value::from("flu"));
        assert_eq!(out.lineage(), None);
    }

    #[test]
    fn test_unattainable_reports_best_effort() {
        let ds = people(&[(30, "02139"), (30, "02139"), (99, "90210")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2)
            .with_max_level("age", 0)
            .with_max_level("zip", 0);
        let err = run(&ds, &config).unwrap_err();
        let best = err.best_effort().unwrap();
        assert_eq!(best.criterion, PrivacyCriterion::KAnonymity { k: 2 });
        assert_eq!(best.violating_records, 1);
        assert_eq!(best.suppression_allowed, 0);
        assert_eq!(best.violating_classes.len(), 1);
        assert_eq!(best.violating_classes[0].values, names(&["99", "90210"]));
    }

    #[test]
    fn test_tie_breaks_on_declaration_order() {
        let schema = vec![
            Attribute::new("a", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("b", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
        ];
        let rows = [("x", "1"), ("y", "1"), ("x", "2"), ("y", "2")]
            .iter()
            .map(|(a, b)| vec![Value::from(*a), Value::from(*b)])
            .collect();
        let ds = Dataset::new(schema, rows).unwrap();
        let hierarchies = HierarchySet::new()
            .with(Hierarchy::suppression_only("a"))
            .with(Hierarchy::suppression_only("b"));
        let config = KAnonymityConfig::new(names(&["a", "b"]), 2);
        let (_, report) = generalize(&ds, &config, &hierarchies, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(report.levels["a"], 1);
        assert_eq!(report.levels["b"], 0);
    }

    fn step(attribute: usize, score: f64, violating_records: usize) -> Step {
        Step {
            attribute,
            score,
            violating_records,
        }
    }

    #[test]
    fn test_pick_step_prefers_lower_level_on_tie() {
        let levels = [2, 1, 1];
        let tied = [step(0, 4.0, 0), step(1, 4.0, 0), step(2, 4.0, 0)];
        assert_eq!(pick_step(&tied, |q| levels[q]), Some(1));
        assert_eq!(pick_step(&[step(0, 5.0, 0), step(1, 4.0, 0)], |q| levels[q]), Some(0));
        assert_eq!(pick_step(&[], |q| levels[q]), None);
    }

    #[test]
    fn test_within_allowance_only_improving_steps_qualify() {
        let steps = vec![step(0, 0.0, 2), step(1, 1.0, 1)];
        assert_eq!(eligible_steps(steps.clone(), 4, 3), steps);
        assert_eq!(eligible_steps(steps.clone(), 2, 3), vec![step(1, 1.0, 1)]);
        assert!(eligible_steps(steps, 1, 3).is_empty());
    }

    #[test]
    fn test_generalizes_when_suppression_would_suffice() {
        // two singletons fit a 2-record allowance, but one age step merges them
        let ds = people(&[(30, "02139"), (30, "02139"), (41, "02139"), (45, "02139")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2).with_suppression_limit(0.5);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.suppressed_records, 0);
        assert_eq!(out.len(), 4);
        assert_eq!(report.levels["age"], 1);
        assert_eq!(report.levels["zip"], 0);
        assert!(!report.early_suppression);
    }

    #[test]
    fn test_early_suppression_stops_at_allowance() {
        let ds = people(&[(30, "02139"), (30, "02139"), (41, "02139"), (45, "02139")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2)
            .with_suppression_limit(0.5)
            .with_early_suppression(true);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.suppressed_records, 2);
        assert_eq!(out.len(), 2);
        assert!(report.early_suppression);
    }

    #[test]
    fn test_local_recoding_uses_the_same_stop_rule() {
        let ds = people(&[(30, "02139"), (30, "02139"), (41, "02139"), (45, "02139")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2)
            .with_suppression_limit(0.5)
            .with_recoding(Recoding::Local);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(report.suppressed_records, 0);
        assert_eq!(out.value(0, 0), &Value::from(30));
        assert_eq!(out.value(2, 0), &Value::from("[40, 50)"));

        let early = config.with_early_suppression(true);
        let (out, report) = run(&ds, &early).unwrap();
        assert_eq!(report.suppressed_records, 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_null_and_null_text_stay_apart() {
        let schema = vec![Attribute::new("code", AttributeRole::QuasiIdentifier, AttributeType::Categorical)];
        let rows = vec![vec![Value::Null], vec![Value::from("NULL")]];
        let ds = Dataset::new(schema, rows).unwrap();
        let hierarchies = HierarchySet::new().with(Hierarchy::suppression_only("code"));
        let config = KAnonymityConfig::new(names(&["code"]), 2);
        let (out, report) = generalize(&ds, &config, &hierarchies, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        // the raw values differ, so only full suppression of the column merges them
        assert_eq!(report.levels["code"], 1);
        assert_eq!(out.value(0, 0), &Value::from("*"));
        assert_eq!(out.value(1, 0), &Value::from("*"));
    }

    #[test]
    fn test_generalizing_banded_values_is_config_error() {
        let ds = people(&[(31, "02139"), (47, "02141")]);
        let levels = BTreeMap::from([("age".to_string(), 1)]);
        let banded = apply_levels(&ds, &names(&["age", "zip"]), &hierarchies(), &levels).unwrap();
        // "[30, 40)" is not a number the age hierarchy can band again
        let err = run(&banded, &KAnonymityConfig::new(names(&["age", "zip"]), 2)).unwrap_err();
        assert!(matches!(err, AnonError::Config(ConfigError::UnknownHierarchyValue { .. })));
    }

    #[test]
    fn test_clustering_recoding_parses() {
        assert_eq!("MDAV".parse::<Recoding>().unwrap(), Recoding::Clustering);
        assert_eq!("clustering".parse::<Recoding>().unwrap(), Recoding::Clustering);
    }

    #[test]
    fn test_local_recoding_leaves_satisfied_rows_raw() {
        let ds = people(&[(30, "02139"), (30, "02139"), (41, "02139"), (45, "02139")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2).with_recoding(Recoding::Local);
        let (out, report) = run(&ds, &config).unwrap();
        assert_eq!(report.recoding, Recoding::Local);
        assert_eq!(out.value(0, 0), &Value::from(30));
        assert_eq!(out.value(2, 0), &Value::from("[40, 50)"));
        assert_eq!(out.value(3, 0), &Value::from("[40, 50)"));
        assert_eq!(report.levels["age"], 1);
        assert_eq!(report.suppressed_records, 0);
    }

    #[test]
    fn test_apply_levels_fixed() {
        let ds = people(&[(31, "02139"), (47, "02141")]);
        let levels = BTreeMap::from([("age".to_string(), 2), ("zip".to_string(), 2)]);
        let out = apply_levels(&ds, &names(&["age", "zip"]), &hierarchies(), &levels).unwrap();
        assert_eq!(out.value(0, 0), &Value::from("[20, 40)"));
        assert_eq!(out.value(1, 1), &Value::from("021**"));
        let again = apply_levels(&ds, &names(&["age", "zip"]), &hierarchies(), &levels).unwrap();
        assert_eq!(out, again);
    }

    #[test]
    fn test_rerun_on_output_is_identity() {
        let ds = people(&[(31, "02139"), (35, "02138"), (38, "02139"), (42, "02141")]);
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2);
        let (out, _) = run(&ds, &config).unwrap();
        let (again, report) = run(&out, &config).unwrap();
        assert_eq!(again, out);
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn test_missing_hierarchy_is_config_error() {
        let ds = people(&[(31, "02139")]);
        let hierarchies = HierarchySet::new().with(Hierarchy::prefix_mask("zip", 5));
        let config = KAnonymityConfig::new(names(&["age", "zip"]), 2);
        let err = generalize(&ds, &config, &hierarchies, &CancellationToken::new()).unwrap_err();
        assert_eq!(err, AnonError::Config(ConfigError::MissingHierarchy("age".to_string())));
    }

    #[test]
    fn test_invalid_parameters() {
        let ds = people(&[(31, "02139")]);
        let token = CancellationToken::new();
        let zero_k = KAnonymityConfig::new(names(&["age"]), 0);
        assert!(generalize(&ds, &zero_k, &hierarchies(), &token).unwrap_err().is_config());
        let bad_limit = KAnonymityConfig::new(names(&["age"]), 2).with_suppression_limit(1.5);
        assert!(generalize(&ds, &bad_limit, &hierarchies(), &token).unwrap_err().is_config());
        let empty = KAnonymityConfig::new(Vec::new(), 2);
        assert!(generalize(&ds, &empty, &hierarchies(), &token).unwrap_err().is_config());
    }

    #[test]
    fn test_cancelled_before_start() {
        let ds = people(&[(31, "02139"), (47, "02141")]);
        let token = CancellationToken::new();
        token.cancel();
        let outcome = generalize(&ds, &KAnonymityConfig::new(names(&["age"]), 2), &hierarchies(), &token).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_allowance_floor() {
        assert_eq!(suppression_allowance(0.29, 100), 29);
        assert_eq!(suppression_allowance(0.05, 99), 4);
        assert_eq!(suppression_allowance(0.0, 1000), 0);
        assert_eq!(suppression_allowance(1.0, 7), 7);
    }
}
