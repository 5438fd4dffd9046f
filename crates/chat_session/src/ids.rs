use time::OffsetDateTime;

/// Issues `"<unix-ms>-<counter>"` message ids, unique within one generator.
#[derive(Debug, Default, Clone)]
pub struct MessageIdGenerator {
    counter: u64,
}

impl MessageIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!("{millis}-{}", self.counter)
    }
}
