//! `session` section payload: the optical-disc session table (spec.md §3,
//! §4.2). Shares the `error2` table's sector-range wire shape; re-exported
//! under its own name since the two tables are semantically distinct
//! (acquisition errors vs. disc sessions) even though they're encoded
//! identically.

pub use super::error2::SectorRange as SessionRange;

use crate::error::Result;

pub fn parse_sessions(payload: &[u8]) -> Result<Vec<SessionRange>> {
    super::error2::parse_ranges(payload)
}

pub fn encode_sessions(sessions: &[SessionRange]) -> Result<Vec<u8>> {
    super::error2::encode_ranges(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sessions = vec![
            SessionRange { start_sector: 0, sector_count: 1000 },
            SessionRange { start_sector: 1000, sector_count: 500 },
        ];
        let payload = encode_sessions(&sessions).unwrap();
        assert_eq!(parse_sessions(&payload).unwrap(), sessions);
    }
}
