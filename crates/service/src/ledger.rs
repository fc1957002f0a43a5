//! Progress ledger service.

use std::sync::Arc;

use async_trait::async_trait;
use ledger_core::{
    CustomerId, Document, EnglishCourse, Exam, JobCategory, LedgerError, Stage, StageKey, TestScore,
    Time, TrackKind, Transition, VisaStep, VisaType,
};
use ledger_progress::{CustomerProgress, EnrollmentPlan, ProgressSnapshot};
use ledger_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};

/// Customer-keyed progress operations.
///
/// Every mutation loads the customer's record, applies the change and saves
/// it back. A rejected change persists nothing.
#[async_trait]
pub trait ProgressLedger: Send + Sync {
    /// Enroll a customer with the standard plan.
    async fn enroll_customer(
        &self,
        customer_id: CustomerId,
        job_category: JobCategory,
        visa_type: VisaType,
    ) -> Result<CustomerProgress>;

    /// Enroll a customer with a custom plan.
    async fn enroll_with_plan(
        &self,
        customer_id: CustomerId,
        plan: EnrollmentPlan,
    ) -> Result<CustomerProgress>;

    /// Weighted overall completion, 0 to 100.
    async fn get_overall_percentage(&self, customer_id: CustomerId) -> Result<f64>;

    /// Weighted completion of one track, 0 to 100.
    async fn get_track_percentage(&self, customer_id: CustomerId, track: TrackKind) -> Result<f64>;

    /// Whether every prerequisite of a stage is complete.
    async fn can_start(&self, customer_id: CustomerId, stage: StageKey) -> Result<bool>;

    /// Apply a transition to one stage and return the updated stage.
    async fn transition(
        &self,
        customer_id: CustomerId,
        stage: StageKey,
        transition: Transition,
    ) -> Result<Stage>;

    /// Start a stage.
    async fn start(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Start).await
    }

    /// Lodge a visa step.
    async fn submit(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Submit).await
    }

    /// Move a lodged visa step under review.
    async fn begin_review(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::BeginReview).await
    }

    /// Approve a visa step.
    async fn approve(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Approve).await
    }

    /// Reject a visa step.
    async fn reject(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Reject).await
    }

    /// Complete a stage, optionally with a score.
    async fn complete(
        &self,
        customer_id: CustomerId,
        stage: StageKey,
        score: Option<f64>,
    ) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Complete { score }).await
    }

    /// Record an externally verified training outcome.
    async fn endorse(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Endorse).await
    }

    /// Administrative reset of a stage.
    async fn reset(&self, customer_id: CustomerId, stage: StageKey) -> Result<Stage> {
        self.transition(customer_id, stage, Transition::Reset).await
    }

    /// Record an English test result; returns the latest score of that test.
    async fn record_test_score(&self, customer_id: CustomerId, score: TestScore) -> Result<f64>;

    /// Count one attended session of a course in progress.
    async fn record_attendance(&self, customer_id: CustomerId, course: EnglishCourse) -> Result<Stage>;

    /// Store a midterm or final mark of a course in progress.
    async fn record_exam(
        &self,
        customer_id: CustomerId,
        course: EnglishCourse,
        exam: Exam,
        score: f64,
    ) -> Result<Stage>;

    /// Add a document to a visa step's checklist.
    async fn require_document(
        &self,
        customer_id: CustomerId,
        step: VisaStep,
        document: Document,
    ) -> Result<Stage>;

    /// Mark a checklist document as handed in.
    async fn submit_document(&self, customer_id: CustomerId, step: VisaStep, name: String) -> Result<Stage>;

    /// Full progress snapshot of one customer.
    async fn snapshot(&self, customer_id: CustomerId) -> Result<ProgressSnapshot>;

    /// Every enrolled customer.
    async fn list_customers(&self) -> Result<Vec<CustomerProgress>>;

    /// Remove a customer's record.
    async fn remove_customer(&self, customer_id: CustomerId) -> Result<()>;
}

/// Ledger service over a storage backend.
pub struct BasicProgressLedger<S: Storage> {
    storage: Arc<Mutex<S>>,
    clock: fn() -> Time,
}

impl<S: Storage> BasicProgressLedger<S> {
    /// Create a new ledger service.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            clock: chrono::Utc::now,
        }
    }

    /// Use a different clock for transition timestamps.
    pub fn with_clock(mut self, clock: fn() -> Time) -> Self {
        self.clock = clock;
        self
    }

    async fn load(&self, customer_id: CustomerId) -> Result<CustomerProgress> {
        self.storage
            .lock()
            .await
            .load_customer(customer_id)
            .await?
            .ok_or(ServiceError::CustomerNotFound(customer_id))
    }

    /// Load, change, save and commit one record under the storage lock.
    async fn update<T, F>(&self, customer_id: CustomerId, action: &str, change: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(&mut CustomerProgress, Time) -> std::result::Result<T, LedgerError> + Send,
    {
        let mut storage = self.storage.lock().await;
        let mut progress = storage
            .load_customer(customer_id)
            .await?
            .ok_or(ServiceError::CustomerNotFound(customer_id))?;

        let output = match change(&mut progress, (self.clock)()) {
            Ok(output) => output,
            Err(e) => {
                warn!(customer = %customer_id, action, error = %e, "change rejected");
                return Err(e.into());
            }
        };

        if let Err(e) = storage.save_customer(&progress).await {
            storage.rollback().await?;
            return Err(e.into());
        }
        storage.commit(&format!("{action} for {customer_id}")).await?;
        Ok(output)
    }

    async fn insert(&self, progress: CustomerProgress) -> Result<CustomerProgress> {
        let customer_id = progress.customer_id;
        let mut storage = self.storage.lock().await;
        if storage.load_customer(customer_id).await?.is_some() {
            return Err(ServiceError::AlreadyEnrolled(customer_id));
        }

        let mut progress = progress;
        match storage.save_customer(&progress).await {
            Ok(revision) => progress.revision = revision,
            Err(e) => {
                storage.rollback().await?;
                return Err(e.into());
            }
        }
        storage.commit(&format!("enroll {customer_id}")).await?;

        info!(
            customer = %customer_id,
            job = %progress.job_category.code,
            visa = %progress.visa_type.code,
            "enrolled customer"
        );
        Ok(progress)
    }
}

#[async_trait]
impl<S: Storage + 'static> ProgressLedger for BasicProgressLedger<S> {
    async fn enroll_customer(
        &self,
        customer_id: CustomerId,
        job_category: JobCategory,
        visa_type: VisaType,
    ) -> Result<CustomerProgress> {
        self.enroll_with_plan(customer_id, EnrollmentPlan::standard(&job_category, &visa_type))
            .await
    }

    async fn enroll_with_plan(
        &self,
        customer_id: CustomerId,
        plan: EnrollmentPlan,
    ) -> Result<CustomerProgress> {
        let progress = CustomerProgress::enroll_with(customer_id, plan, (self.clock)())?;
        self.insert(progress).await
    }

    async fn get_overall_percentage(&self, customer_id: CustomerId) -> Result<f64> {
        Ok(self.load(customer_id).await?.overall_percentage())
    }

    async fn get_track_percentage(&self, customer_id: CustomerId, track: TrackKind) -> Result<f64> {
        Ok(self.load(customer_id).await?.track_percentage(track))
    }

    async fn can_start(&self, customer_id: CustomerId, stage: StageKey) -> Result<bool> {
        Ok(self.load(customer_id).await?.can_start(stage)?)
    }

    async fn transition(
        &self,
        customer_id: CustomerId,
        stage: StageKey,
        transition: Transition,
    ) -> Result<Stage> {
        let updated = self
            .update(customer_id, transition.name(), |progress, at| {
                progress.apply(stage, transition, at).cloned()
            })
            .await?;

        debug!(
            customer = %customer_id,
            stage = %stage,
            action = transition.name(),
            status = %updated.status,
            "stage transition"
        );
        Ok(updated)
    }

    async fn record_test_score(&self, customer_id: CustomerId, score: TestScore) -> Result<f64> {
        let test_type = score.test_type;
        let overall = score.overall;
        let latest = self
            .update(customer_id, "record test score", move |progress, at| {
                progress.record_test_score(score, at)?;
                Ok(progress.latest_score(test_type))
            })
            .await?;

        info!(customer = %customer_id, test = test_type.as_str(), overall, latest, "recorded test score");
        Ok(latest)
    }

    async fn record_attendance(&self, customer_id: CustomerId, course: EnglishCourse) -> Result<Stage> {
        let stage = self
            .update(customer_id, "record attendance", |progress, at| {
                progress.record_attendance(course, at).cloned()
            })
            .await?;

        let attended = stage.coursework.as_ref().map_or(0, |w| w.attended_sessions);
        debug!(customer = %customer_id, course = course.as_str(), attended, "recorded attendance");
        Ok(stage)
    }

    async fn record_exam(
        &self,
        customer_id: CustomerId,
        course: EnglishCourse,
        exam: Exam,
        score: f64,
    ) -> Result<Stage> {
        let stage = self
            .update(customer_id, "record exam", |progress, at| {
                progress.record_exam(course, exam, score, at).cloned()
            })
            .await?;

        debug!(customer = %customer_id, course = course.as_str(), exam = exam.as_str(), score, "recorded exam");
        Ok(stage)
    }

    async fn require_document(
        &self,
        customer_id: CustomerId,
        step: VisaStep,
        document: Document,
    ) -> Result<Stage> {
        let name = document.name.clone();
        let stage = self
            .update(customer_id, "require document", move |progress, at| {
                progress.require_document(step, document, at).cloned()
            })
            .await?;

        info!(customer = %customer_id, step = step.as_str(), document = %name, "document required");
        Ok(stage)
    }

    async fn submit_document(&self, customer_id: CustomerId, step: VisaStep, name: String) -> Result<Stage> {
        let stage = self
            .update(customer_id, "submit document", |progress, at| {
                progress.submit_document(step, &name, at).cloned()
            })
            .await?;

        info!(
            customer = %customer_id,
            step = step.as_str(),
            document = %name,
            missing = stage.missing_documents().len(),
            "document submitted"
        );
        Ok(stage)
    }

    async fn snapshot(&self, customer_id: CustomerId) -> Result<ProgressSnapshot> {
        Ok(self.load(customer_id).await?.snapshot((self.clock)()))
    }

    async fn list_customers(&self) -> Result<Vec<CustomerProgress>> {
        Ok(self.storage.lock().await.list_customers().await?)
    }

    async fn remove_customer(&self, customer_id: CustomerId) -> Result<()> {
        let mut storage = self.storage.lock().await;
        if storage.load_customer(customer_id).await?.is_none() {
            return Err(ServiceError::CustomerNotFound(customer_id));
        }
        storage.delete_customer(customer_id).await?;
        storage.commit(&format!("remove {customer_id}")).await?;
        info!(customer = %customer_id, "removed customer");
        Ok(())
    }
}
