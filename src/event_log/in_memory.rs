use super::*;
use anyhow::format_err;
use parking_lot::{Condvar, Mutex};

type InMemoryLogInner = Vec<Event>;

pub struct InMemoryLog {
    inner: Mutex<InMemoryLogInner>,
    condvar: Condvar,
}

impl InMemoryLog {
    fn write_events(&self, events: &[Event]) -> Result<Offset> {
        let mut inner = self.inner.lock();
        inner.extend_from_slice(events);
        self.condvar.notify_all();
        Ok(u64::try_from(inner.len())?)
    }
}

impl Reader for InMemoryLog {
    fn read(&self, offset: Offset, limit: usize, timeout: Option<Duration>) -> Result<WithOffset> {
        let offset_usize = usize::try_from(offset)?;

        let mut inner = self.inner.lock();

        if inner.len() == offset_usize {
            match timeout {
                Some(timeout) => {
                    self.condvar.wait_for(&mut inner, timeout);
                }
                None => self.condvar.wait(&mut inner),
            }
        }

        let data: Vec<_> = inner
            .get(offset_usize..)
            .ok_or_else(|| format_err!("offset out of bounds: {offset}"))?
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, e)| LogEvent {
                offset: offset + u64::try_from(i).expect("no fail"),
                details: e.clone(),
            })
            .collect();

        Ok(WithOffset {
            offset: offset + u64::try_from(data.len()).expect("no fail"),
            data,
        })
    }

    fn get_start_offset(&self) -> Result<Offset> {
        Ok(0)
    }
}

impl Writer for InMemoryLog {
    fn write(&self, events: &[Event]) -> Result<Offset> {
        self.write_events(events)
    }
}

pub fn new_in_memory_shared() -> (SharedWriter, SharedReader) {
    let log = Arc::new(InMemoryLog {
        inner: Mutex::new(Vec::new()),
        condvar: Condvar::new(),
    });
    (log.clone(), log)
}
