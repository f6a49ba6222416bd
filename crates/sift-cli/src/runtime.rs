// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use sift_app::{ModerationAction, Record, RecordId};
use sift_backend::Client;
use sift_tui::{AppRuntime, ChannelHandle, InternalEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

/// Runtime backed by the remote record service.
pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ApiRuntime {
    fn load_records(&mut self, table: &str) -> Result<Vec<Record>> {
        self.client.select_all(table)
    }

    fn submit_status(&mut self, table: &str, id: RecordId, action: ModerationAction) -> Result<()> {
        self.client.update_status(table, id, action)
    }

    fn open_channel(
        &mut self,
        table: &str,
        generation: u64,
        tx: Sender<InternalEvent>,
    ) -> Result<ChannelHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = Arc::clone(&stop);
        let client = self.client.clone();
        let table = table.to_owned();

        // The feed blocks on the socket; a dedicated thread reads it and
        // forwards a wake-up per change. The thread exits when the handle
        // is closed, the receiver goes away, or the stream ends.
        thread::spawn(move || {
            let Ok(stream) = client.subscribe(&table) else {
                return;
            };
            for event in stream {
                if reader_stop.load(Ordering::Relaxed) {
                    break;
                }
                let Ok(event) = event else {
                    break;
                };
                if event.table != table {
                    continue;
                }
                if tx.send(InternalEvent::TableChanged { generation }).is_err() {
                    break;
                }
            }
        });

        Ok(ChannelHandle::new(stop))
    }
}

/// In-memory runtime for `--demo`: no network, seeded rows, writes kept for
/// the life of the process.
pub struct DemoRuntime {
    records: Vec<Record>,
}

impl DemoRuntime {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl AppRuntime for DemoRuntime {
    fn load_records(&mut self, _table: &str) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn submit_status(&mut self, _table: &str, id: RecordId, action: ModerationAction) -> Result<()> {
        for record in &mut self.records {
            if record.id == id {
                record.status = Some(action.resulting_status());
            }
        }
        Ok(())
    }

    fn open_channel(
        &mut self,
        _table: &str,
        _generation: u64,
        _tx: Sender<InternalEvent>,
    ) -> Result<ChannelHandle> {
        Ok(ChannelHandle::new(Arc::new(AtomicBool::new(false))))
    }
}
