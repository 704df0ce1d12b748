use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Why an evaluation came out the way it did. Every `EvaluationResult`
/// carries exactly one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluationReason {
    FlagNotFound,
    FlagExpired,
    RolloutOff,
    UnknownRolloutState,
    InternalOnly,
    GlobalScope,
    RoleMatched,
    RoleNotMatched,
    UserMatched,
    UserNotMatched,
    SpaceMatched,
    SpaceNotMatched,
    AudienceMatched,
    CountryNotMatched,
    PincodeNotMatched,
    CohortNotMatched,
    UnknownScope,
    InRolloutBound,
    OutOfRolloutBound,
    NoRolloutPercentage,
    VariantAssigned,
    NoVariants,
    UnknownType,
}
