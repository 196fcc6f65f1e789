//! 桌台二维码令牌
//!
//! token = hex(HMAC-SHA256(secret, "{table_id}:{epoch}")). The epoch lives
//! in the table registry and is bumped when a session closes, so a QR code
//! printed for an earlier party stops working.

use ring::hmac;

pub struct TableTokenService {
    key: hmac::Key,
}

impl std::fmt::Debug for TableTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableTokenService").finish_non_exhaustive()
    }
}

impl TableTokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    fn message(table_id: &str, epoch: u64) -> String {
        format!("{table_id}:{epoch}")
    }

    /// Token for `table_id` at `epoch`
    pub fn issue(&self, table_id: &str, epoch: u64) -> String {
        let tag = hmac::sign(&self.key, Self::message(table_id, epoch).as_bytes());
        hex::encode(tag.as_ref())
    }

    /// Constant-time check against the table's current epoch
    pub fn verify(&self, table_id: &str, epoch: u64, token: &str) -> bool {
        let Ok(tag) = hex::decode(token) else {
            return false;
        };
        hmac::verify(&self.key, Self::message(table_id, epoch).as_bytes(), &tag).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let service = TableTokenService::new(b"table-secret");
        let token = service.issue("t1", 1);
        assert_eq!(token.len(), 64);
        assert!(service.verify("t1", 1, &token));
    }

    #[test]
    fn test_rotation_invalidates_token() {
        let service = TableTokenService::new(b"table-secret");
        let old = service.issue("t1", 1);
        assert!(!service.verify("t1", 2, &old));
        assert!(service.verify("t1", 2, &service.issue("t1", 2)));
    }

    #[test]
    fn test_wrong_table_or_garbage() {
        let service = TableTokenService::new(b"table-secret");
        let token = service.issue("t1", 1);
        assert!(!service.verify("t2", 1, &token));
        assert!(!service.verify("t1", 1, "not-hex"));
        assert!(!service.verify("t1", 1, ""));
        assert!(!TableTokenService::new(b"other").verify("t1", 1, &token));
    }
}
