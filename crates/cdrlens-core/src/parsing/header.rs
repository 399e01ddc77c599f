use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical leg fields that vendor headers can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CallId,
    CorrelationId,
    LegId,
    StartTime,
    AnswerTime,
    EndTime,
    ReleaseTime,
    Duration,
    Direction,
    CallType,
    CallerNumber,
    CalledNumber,
    OriginalCalledNumber,
    RedirectingNumber,
    Location,
    Department,
    UserName,
    UserType,
    ClientType,
    DeviceType,
    ReleaseCause,
    Answered,
    CallOutcome,
    LegType,
}

/// Resolve a vendor header to a canonical field.
///
/// Matching ignores case, whitespace, underscores and hyphens, so
/// "Call ID", "CallId" and "call_id" all resolve to `Field::CallId`.
pub fn canonical_field(header: &str) -> Option<Field> {
    HEADER_VARIANTS.get(header_key(header).as_str()).copied()
}

/// Lookup key for a header: lowercase with separators removed.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

static HEADER_VARIANTS: LazyLock<HashMap<&'static str, Field>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Identifiers
    m.insert("callid", Field::CallId);
    m.insert("correlationid", Field::CorrelationId);
    m.insert("localcallid", Field::LegId);
    m.insert("legid", Field::LegId);
    m.insert("localsessionid", Field::LegId);

    // Timestamps
    m.insert("starttime", Field::StartTime);
    m.insert("start", Field::StartTime);
    m.insert("answertime", Field::AnswerTime);
    m.insert("endtime", Field::EndTime);
    m.insert("releasetime", Field::ReleaseTime);

    m.insert("duration", Field::Duration);
    m.insert("duration(s)", Field::Duration);

    m.insert("direction", Field::Direction);
    m.insert("calltype", Field::CallType);

    // Parties
    m.insert("callingnumber", Field::CallerNumber);
    m.insert("callingpartynumber", Field::CallerNumber);
    m.insert("callernumber", Field::CallerNumber);
    m.insert("callednumber", Field::CalledNumber);
    m.insert("calledpartynumber", Field::CalledNumber);
    m.insert("dialeddigits", Field::CalledNumber);
    m.insert("originalcalledpartynumber", Field::OriginalCalledNumber);
    m.insert("originalcallednumber", Field::OriginalCalledNumber);
    m.insert("redirectingpartynumber", Field::RedirectingNumber);
    m.insert("redirectingnumber", Field::RedirectingNumber);

    // Organization
    m.insert("site", Field::Location);
    m.insert("location", Field::Location);
    m.insert("department", Field::Department);
    m.insert("departmentid", Field::Department);
    m.insert("user", Field::UserName);
    m.insert("username", Field::UserName);
    m.insert("usertype", Field::UserType);
    m.insert("clienttype", Field::ClientType);
    m.insert("devicetype", Field::DeviceType);

    // Outcome
    m.insert("releasecause", Field::ReleaseCause);
    m.insert("endreason", Field::ReleaseCause);
    m.insert("answered", Field::Answered);
    m.insert("calloutcome", Field::CallOutcome);
    m.insert("legtype", Field::LegType);

    m
});
