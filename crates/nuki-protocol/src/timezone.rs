//! Timezone identifiers reported in the device configuration

use std::fmt;

/// Static description of a timezone id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZoneInfo {
    /// IANA name
    pub name: &'static str,
    /// UTC offset, standard/daylight
    pub offset: &'static str,
    /// Common abbreviations
    pub abbreviations: &'static str,
    /// Whether daylight saving applies
    pub dst: bool,
}

// Indexed by id.
const TIMEZONES: &[TimeZoneInfo] = &[
    TimeZoneInfo { name: "Africa/Cairo", offset: "UTC+2", abbreviations: "EET", dst: false },
    TimeZoneInfo { name: "Africa/Lagos", offset: "UTC+1", abbreviations: "WAT", dst: false },
    TimeZoneInfo { name: "Africa/Maputo", offset: "UTC+2", abbreviations: "CAT, SAST", dst: false },
    TimeZoneInfo { name: "Africa/Nairobi", offset: "UTC+3", abbreviations: "EAT", dst: false },
    TimeZoneInfo { name: "America/Anchorage", offset: "UTC-9/-8", abbreviations: "AKDT", dst: true },
    TimeZoneInfo { name: "America/Argentina/Buenos_Aires", offset: "UTC-3", abbreviations: "ART, UYT", dst: false },
    TimeZoneInfo { name: "America/Chicago", offset: "UTC-6/-5", abbreviations: "CDT", dst: true },
    TimeZoneInfo { name: "America/Denver", offset: "UTC-7/-6", abbreviations: "MDT", dst: true },
    TimeZoneInfo { name: "America/Halifax", offset: "UTC-4/-3", abbreviations: "ADT", dst: true },
    TimeZoneInfo { name: "America/Los_Angeles", offset: "UTC-8/-7", abbreviations: "PDT", dst: true },
    TimeZoneInfo { name: "America/Manaus", offset: "UTC-4", abbreviations: "AMT, BOT, VET, AST, GYT", dst: false },
    TimeZoneInfo { name: "America/Mexico_City", offset: "UTC-6/-5", abbreviations: "CDT", dst: true },
    TimeZoneInfo { name: "America/New_York", offset: "UTC-5/-4", abbreviations: "EDT", dst: true },
    TimeZoneInfo { name: "America/Phoenix", offset: "UTC-7", abbreviations: "MST", dst: false },
    TimeZoneInfo { name: "America/Regina", offset: "UTC-6", abbreviations: "CST", dst: false },
    TimeZoneInfo { name: "America/Santiago", offset: "UTC-4/-3", abbreviations: "CLST, AMST, WARST, PYST", dst: true },
    TimeZoneInfo { name: "America/Sao_Paulo", offset: "UTC-3", abbreviations: "BRT", dst: false },
    TimeZoneInfo { name: "America/St_Johns", offset: "UTC-3½/ -2½", abbreviations: "NDT", dst: true },
    TimeZoneInfo { name: "Asia/Bangkok", offset: "UTC+7", abbreviations: "ICT, WIB", dst: false },
    TimeZoneInfo { name: "Asia/Dubai", offset: "UTC+4", abbreviations: "SAMT, GET, AZT, GST, MUT, RET, SCT, AMT-Arm", dst: false },
    TimeZoneInfo { name: "Asia/Hong_Kong", offset: "UTC+8", abbreviations: "HKT", dst: false },
    TimeZoneInfo { name: "Asia/Jerusalem", offset: "UTC+2/+3", abbreviations: "IDT", dst: true },
    TimeZoneInfo { name: "Asia/Karachi", offset: "UTC+5", abbreviations: "PKT, YEKT, TMT, UZT, TJT, ORAT", dst: false },
    TimeZoneInfo { name: "Asia/Kathmandu", offset: "UTC+5¾", abbreviations: "NPT", dst: false },
    TimeZoneInfo { name: "Asia/Kolkata", offset: "UTC+5½", abbreviations: "IST", dst: false },
    TimeZoneInfo { name: "Asia/Riyadh", offset: "UTC+3", abbreviations: "AST-Arabia", dst: false },
    TimeZoneInfo { name: "Asia/Seoul", offset: "UTC+9", abbreviations: "KST", dst: false },
    TimeZoneInfo { name: "Asia/Shanghai", offset: "UTC+8", abbreviations: "CST, ULAT, IRKT, PHT, BND, WITA", dst: false },
    TimeZoneInfo { name: "Asia/Tehran", offset: "UTC+3½", abbreviations: "ARST", dst: false },
    TimeZoneInfo { name: "Asia/Tokyo", offset: "UTC+9", abbreviations: "JST, WIT, PWT, YAKT", dst: false },
    TimeZoneInfo { name: "Asia/Yangon", offset: "UTC+6½", abbreviations: "MMT", dst: false },
    TimeZoneInfo { name: "Australia/Adelaide", offset: "UTC+9½/10½", abbreviations: "ACDT", dst: true },
    TimeZoneInfo { name: "Australia/Brisbane", offset: "UTC+10", abbreviations: "AEST, PGT, VLAT", dst: false },
    TimeZoneInfo { name: "Australia/Darwin", offset: "UTC+9½", abbreviations: "ACST", dst: false },
    TimeZoneInfo { name: "Australia/Hobart", offset: "UTC+10/+11", abbreviations: "AEDT", dst: true },
    TimeZoneInfo { name: "Australia/Perth", offset: "UTC+8", abbreviations: "AWST", dst: false },
    TimeZoneInfo { name: "Australia/Sydney", offset: "UTC+10/+11", abbreviations: "AEDT", dst: true },
    TimeZoneInfo { name: "Europe/Berlin", offset: "UTC+1/+2", abbreviations: "CEST", dst: true },
    TimeZoneInfo { name: "Europe/Helsinki", offset: "UTC+2/+3", abbreviations: "EEST", dst: true },
    TimeZoneInfo { name: "Europe/Istanbul", offset: "UTC+3", abbreviations: "TRT", dst: false },
    TimeZoneInfo { name: "Europe/London", offset: "UTC+0/+1", abbreviations: "BST, IST", dst: true },
    TimeZoneInfo { name: "Europe/Moscow", offset: "UTC+3", abbreviations: "MSK", dst: false },
    TimeZoneInfo { name: "Pacific/Auckland", offset: "UTC+12/+13", abbreviations: "NZDT", dst: true },
    TimeZoneInfo { name: "Pacific/Guam", offset: "UTC+10", abbreviations: "ChST", dst: false },
    TimeZoneInfo { name: "Pacific/Honolulu", offset: "UTC-10", abbreviations: "H(A)ST", dst: false },
    TimeZoneInfo { name: "Pacific/Pago_Pago", offset: "UTC-11", abbreviations: "SST", dst: false },
];

/// Timezone id as stored in the device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeZoneId(pub u16);

impl TimeZoneId {
    /// Table entry, or `None` for ids this implementation does not know
    pub fn info(self) -> Option<&'static TimeZoneInfo> {
        TIMEZONES.get(usize::from(self.0))
    }

    /// IANA name, empty for unknown ids
    pub fn name(self) -> &'static str {
        self.info().map(|i| i.name).unwrap_or("")
    }

    /// Look up an id by IANA name
    pub fn from_name(name: &str) -> Option<Self> {
        TIMEZONES
            .iter()
            .position(|i| i.name == name)
            .and_then(|idx| u16::try_from(idx).ok())
            .map(TimeZoneId)
    }
}

impl fmt::Display for TimeZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Some(info) => write!(
                f,
                "{} | {} | {} | {}",
                info.name, info.offset, info.abbreviations, info.dst
            ),
            None => write!(f, "unknown timezone {}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        assert_eq!(TimeZoneId(0).name(), "Africa/Cairo");
        assert_eq!(TimeZoneId(37).name(), "Europe/Berlin");
        assert_eq!(TimeZoneId(45).name(), "Pacific/Pago_Pago");
        assert!(TimeZoneId(37).info().unwrap().dst);
        assert!(!TimeZoneId(13).info().unwrap().dst);
    }

    #[test]
    fn test_unknown_id() {
        assert!(TimeZoneId(46).info().is_none());
        assert_eq!(TimeZoneId(0xFFFE).name(), "");
        assert_eq!(TimeZoneId(0xFFFE).to_string(), "unknown timezone 65534");
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(TimeZoneId::from_name("Europe/London"), Some(TimeZoneId(40)));
        assert_eq!(TimeZoneId::from_name("Mars/Olympus_Mons"), None);
    }
}
