use super::domain::BloodType;

use BloodType::*;

/// Donor blood types that may satisfy a request for `recipient`, in tie-break
/// preference order: the exact type always comes first, remaining compatible
/// types follow. Transfusion-medicine constants, not configuration.
pub const fn compatible_donors(recipient: BloodType) -> &'static [BloodType] {
    match recipient {
        APos => &[APos, ANeg, OPos, ONeg],
        ANeg => &[ANeg, ONeg],
        BPos => &[BPos, BNeg, OPos, ONeg],
        BNeg => &[BNeg, ONeg],
        AbPos => &[AbPos, AbNeg, APos, ANeg, BPos, BNeg, OPos, ONeg],
        AbNeg => &[AbNeg, ANeg, BNeg, ONeg],
        OPos => &[OPos, ONeg],
        ONeg => &[ONeg],
    }
}

/// Tie-break rank used by the allocation ordering: exact type first, every
/// other compatible type second.
pub(crate) fn preference_rank(recipient: BloodType, donor: BloodType) -> u8 {
    if recipient == donor {
        0
    } else {
        1
    }
}
