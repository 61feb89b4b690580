//! Grade-based feature limits.
//!
//! Entitlements are a pure function of `(grade, is_admin)` and are derived
//! per request, never stored. The admin flag overrides every grade restriction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Grade, User};

/// Detail images allowed on a basic listing.
pub const BASIC_MAX_DETAIL_IMAGES: u32 = 1;
/// Category tags allowed on a basic listing.
pub const BASIC_MAX_CATEGORY_TAGS: u32 = 3;
/// Length of the enterprise trial started by the survey.
pub const TRIAL_DURATION_DAYS: i64 = 90;

/// A countable feature quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Quota::Limited(max) => count <= max as usize,
            Quota::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSet {
    pub max_detail_images: Quota,
    pub max_category_tags: Quota,
    pub can_customize_color: bool,
    pub can_upload_video: bool,
    pub can_be_featured: bool,
}

impl EntitlementSet {
    const UNRESTRICTED: Self = Self {
        max_detail_images: Quota::Unlimited,
        max_category_tags: Quota::Unlimited,
        can_customize_color: true,
        can_upload_video: true,
        can_be_featured: true,
    };

    const BASIC: Self = Self {
        max_detail_images: Quota::Limited(BASIC_MAX_DETAIL_IMAGES),
        max_category_tags: Quota::Limited(BASIC_MAX_CATEGORY_TAGS),
        can_customize_color: false,
        can_upload_video: false,
        can_be_featured: false,
    };

    /// Check a profile's feature usage, reporting the first exceeded feature.
    pub fn check_profile(&self, usage: &ProfileUsage) -> Result<(), EntitlementExceeded> {
        if !self.max_detail_images.allows(usage.detail_images) {
            return Err(EntitlementExceeded::quota(
                Feature::DetailImages,
                self.max_detail_images,
            ));
        }
        if !self.max_category_tags.allows(usage.category_tags) {
            return Err(EntitlementExceeded::quota(
                Feature::CategoryTags,
                self.max_category_tags,
            ));
        }
        if usage.brand_color && !self.can_customize_color {
            return Err(EntitlementExceeded::denied(Feature::BrandColor));
        }
        if usage.video && !self.can_upload_video {
            return Err(EntitlementExceeded::denied(Feature::Video));
        }
        Ok(())
    }

    pub fn check_featured(&self) -> Result<(), EntitlementExceeded> {
        if self.can_be_featured {
            Ok(())
        } else {
            Err(EntitlementExceeded::denied(Feature::Featured))
        }
    }
}

/// Map a grade and admin flag to the feature limits that apply.
pub fn evaluate(grade: Grade, is_admin: bool) -> EntitlementSet {
    if is_admin {
        return EntitlementSet::UNRESTRICTED;
    }
    match grade {
        Grade::Enterprise | Grade::EnterpriseTrial => EntitlementSet::UNRESTRICTED,
        Grade::Basic => EntitlementSet::BASIC,
    }
}

/// Limits of a stored user at `now`, honoring the trial policy.
pub fn for_user(user: &User, now: DateTime<Utc>, policy: TrialPolicy) -> EntitlementSet {
    let grade = effective_grade(user.grade, user.trial_ends_at, now, policy);
    evaluate(grade, user.is_admin)
}

/// Feature usage of a listing being saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUsage {
    pub detail_images: usize,
    pub category_tags: usize,
    pub brand_color: bool,
    pub video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DetailImages,
    CategoryTags,
    BrandColor,
    Video,
    Featured,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::DetailImages => "detail_images",
            Feature::CategoryTags => "category_tags",
            Feature::BrandColor => "brand_color",
            Feature::Video => "video",
            Feature::Featured => "featured",
        }
    }
}

/// A user tried to go beyond what their grade allows. This is an upgrade
/// prompt, not an authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{} is not available on the current plan", .feature.as_str())]
pub struct EntitlementExceeded {
    pub feature: Feature,
    /// The quota that was exceeded, `None` for on/off features.
    pub limit: Option<u32>,
}

impl EntitlementExceeded {
    fn quota(feature: Feature, quota: Quota) -> Self {
        let limit = match quota {
            Quota::Limited(max) => Some(max),
            Quota::Unlimited => None,
        };
        Self { feature, limit }
    }

    fn denied(feature: Feature) -> Self {
        Self {
            feature,
            limit: None,
        }
    }
}

/// What happens to an enterprise trial once its end date has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrialPolicy {
    /// Lapsed trials keep enterprise limits until an administrator changes the grade.
    #[default]
    Honor,
    /// Lapsed trials are treated as basic and downgraded by the maintenance task.
    Downgrade,
}

/// End date of a trial started at `now`.
pub fn trial_end(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(TRIAL_DURATION_DAYS)
}

/// The grade that limits should be evaluated against under the given policy.
pub fn effective_grade(
    grade: Grade,
    trial_ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: TrialPolicy,
) -> Grade {
    match (grade, trial_ends_at, policy) {
        (Grade::EnterpriseTrial, Some(ends_at), TrialPolicy::Downgrade) if ends_at <= now => {
            Grade::Basic
        }
        _ => grade,
    }
}
