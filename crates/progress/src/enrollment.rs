//! Enrollment plans: which stages a customer gets and how they are wired.

use ledger_core::{
    english_templates, training_templates, visa_templates, JobCategory, StageKey, StageTemplate,
    TrackKind, VisaType,
};
use ledger_dependency::{DependencyEdge, DependencyGraph};

/// Blueprint for a customer's stages and prerequisite edges.
///
/// By default every track is chained linearly in template order. A chain can
/// be dropped per track, a single stage's prerequisites can be replaced, and
/// extra edges (including cross-track ones) can be added.
#[derive(Debug, Clone)]
pub struct EnrollmentPlan {
    /// Job the customer trains for
    pub job_category: JobCategory,

    /// Visa the customer applies for
    pub visa_type: VisaType,

    templates: Vec<StageTemplate>,
    unchained: Vec<TrackKind>,
    overrides: Vec<(StageKey, Vec<StageKey>)>,
    extra_edges: Vec<DependencyEdge>,
}

impl EnrollmentPlan {
    /// The standard plan: four training stages sized for the job, five
    /// English courses, seven visa steps, each track chained.
    pub fn standard(job_category: &JobCategory, visa_type: &VisaType) -> Self {
        let mut templates = training_templates(job_category);
        templates.extend(english_templates());
        templates.extend(visa_templates());

        Self {
            job_category: job_category.clone(),
            visa_type: visa_type.clone(),
            templates,
            unchained: Vec::new(),
            overrides: Vec::new(),
            extra_edges: Vec::new(),
        }
    }

    /// Replace the templates of one track.
    pub fn with_templates(mut self, track: TrackKind, templates: Vec<StageTemplate>) -> Self {
        self.templates.retain(|t| t.key.track() != track);
        self.templates.extend(templates);
        self
    }

    /// Drop the implicit linear chain of a track.
    pub fn without_chain(mut self, track: TrackKind) -> Self {
        if !self.unchained.contains(&track) {
            self.unchained.push(track);
        }
        self
    }

    /// Replace the prerequisites of one stage.
    pub fn with_prerequisites(mut self, stage: StageKey, prerequisites: Vec<StageKey>) -> Self {
        self.overrides.retain(|(key, _)| *key != stage);
        self.overrides.push((stage, prerequisites));
        self
    }

    /// Add an extra edge.
    pub fn with_edge(mut self, dependent: StageKey, prerequisite: StageKey) -> Self {
        self.extra_edges.push(DependencyEdge::new(dependent, prerequisite));
        self
    }

    /// Stage templates, grouped by track in track order.
    pub fn templates(&self) -> impl Iterator<Item = &StageTemplate> {
        TrackKind::ALL
            .into_iter()
            .flat_map(move |track| self.templates_of(track))
    }

    /// Templates of one track in plan order.
    pub fn templates_of(&self, track: TrackKind) -> impl Iterator<Item = &StageTemplate> {
        self.templates.iter().filter(move |t| t.key.track() == track)
    }

    /// Resolve the plan into its full edge list.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges = Vec::new();

        for track in TrackKind::ALL {
            if self.unchained.contains(&track) {
                continue;
            }
            let keys: Vec<StageKey> = self.templates_of(track).map(|t| t.key).collect();
            edges.extend(DependencyGraph::linear_chain(&keys));
        }

        for (stage, prerequisites) in &self.overrides {
            edges.retain(|e| e.dependent != *stage);
            edges.extend(prerequisites.iter().map(|pre| DependencyEdge::new(*stage, *pre)));
        }

        edges.extend(self.extra_edges.iter().copied());
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{EnglishCourse, TrainingStage, VisaCategory, VisaStep};

    fn plan() -> EnrollmentPlan {
        EnrollmentPlan::standard(
            &JobCategory::new("CHEF", "Chef"),
            &VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work),
        )
    }

    #[test]
    fn test_standard_plan_chains_every_track() {
        let plan = plan();
        assert_eq!(plan.templates().count(), 16);
        // 3 + 4 + 6 chain edges
        assert_eq!(plan.edges().len(), 13);
    }

    #[test]
    fn test_without_chain_drops_track_edges() {
        let plan = plan().without_chain(TrackKind::English);
        let edges = plan.edges();
        assert_eq!(edges.len(), 9);
        assert!(edges.iter().all(|e| e.dependent.track() != TrackKind::English));
    }

    #[test]
    fn test_override_replaces_chain_edge() {
        let internship = StageKey::Training(TrainingStage::Internship);
        let theory = StageKey::Training(TrainingStage::Theory);
        let edges = plan().with_prerequisites(internship, vec![theory]).edges();

        let prereqs: Vec<_> = edges
            .iter()
            .filter(|e| e.dependent == internship)
            .map(|e| e.prerequisite)
            .collect();
        assert_eq!(prereqs, vec![theory]);
    }

    #[test]
    fn test_cross_track_edge() {
        let visa = StageKey::Visa(VisaStep::Visa);
        let interview = StageKey::English(EnglishCourse::Interview);
        let edges = plan().with_edge(visa, interview).edges();
        assert!(edges.contains(&DependencyEdge::new(visa, interview)));
    }

    #[test]
    fn test_with_templates_replaces_track() {
        let plan = plan().with_templates(
            TrackKind::Visa,
            vec![
                StageTemplate::new(StageKey::Visa(VisaStep::Checklist)),
                StageTemplate::new(StageKey::Visa(VisaStep::Visa)),
            ],
        );
        assert_eq!(plan.templates_of(TrackKind::Visa).count(), 2);
        assert_eq!(plan.edges().len(), 3 + 4 + 1);
    }
}
