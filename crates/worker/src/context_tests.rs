// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use atlas_wire::ReplyStatus;
use tokio::net::UnixStream;

/// Sink stub recording every published reply.
#[derive(Default)]
struct RecordingSink {
    replies: Mutex<Vec<Reply>>,
    raw: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn publish_reply(&self, reply: &Reply) -> Result<(), BrokerError> {
        self.replies.lock().push(reply.clone());
        Ok(())
    }

    async fn publish_raw(&self, body: &[u8]) -> Result<(), BrokerError> {
        self.raw.lock().push(body.to_vec());
        Ok(())
    }
}

fn context(raise_on_close: bool) -> (JobContext, Arc<RecordingSink>, Arc<CommandPipe>) {
    let (local, remote) = UnixStream::pair().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let ctx = JobContext::new(
        RequestId::new(),
        0,
        sink.clone(),
        Arc::new(CommandPipe::new(local)),
        raise_on_close,
    );
    (ctx, sink, Arc::new(CommandPipe::new(remote)))
}

async fn close_arrives(ctx: &JobContext) {
    for _ in 0..200 {
        if ctx.is_close_requested() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("close command never arrived");
}

#[tokio::test]
async fn progress_publishes_in_progress_replies() {
    let (ctx, sink, _remote) = context(false);

    ctx.publish_progress(0.25, "a quarter done").await.unwrap();
    ctx.publish_message("still at a quarter").await.unwrap();

    let replies = sink.replies.lock().clone();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].status, ReplyStatus::InProgress);
    assert_eq!(replies[0].progress, 0.25);
    assert_eq!(replies[1].progress, 0.25, "publish_message keeps last progress");
    assert_eq!(replies[1].message, "still at a quarter");
}

#[tokio::test]
async fn progress_is_clamped_to_unit_interval() {
    let (ctx, sink, _remote) = context(false);
    ctx.publish_progress(3.0, "overshoot").await.unwrap();
    assert_eq!(sink.replies.lock()[0].progress, 1.0);
}

#[tokio::test]
async fn close_sets_cooperative_flag_without_raising() {
    let (ctx, _sink, remote) = context(false);
    assert!(!ctx.is_close_requested());

    remote.send(&PipeMsg::CloseTask { username: "user1".into() }).await.unwrap();
    close_arrives(&ctx).await;

    assert_eq!(ctx.close_username(), "user1");
    // Publishing still succeeds for cooperative handlers
    assert!(ctx.publish_progress(0.5, "winding down").await.is_ok());
}

#[tokio::test]
async fn close_raises_on_next_publish_when_opted_in() {
    let (ctx, _sink, remote) = context(true);
    remote.send(&PipeMsg::CloseTask { username: "user1".into() }).await.unwrap();
    close_arrives(&ctx).await;

    let err = ctx.publish_progress(0.5, "about to stop").await.unwrap_err();
    assert_eq!(err, JobError::CloseRequested { username: "user1".into() });
}

#[tokio::test]
async fn raw_bodies_bypass_reply_encoding() {
    let (ctx, sink, _remote) = context(false);
    ctx.publish_raw(b"Hello").await.unwrap();
    assert_eq!(sink.raw.lock().as_slice(), [b"Hello".to_vec()]);
    assert!(sink.replies.lock().is_empty());
}

#[tokio::test]
async fn sink_failure_fails_the_publish() {
    struct FailingSink;

    #[async_trait]
    impl ReplySink for FailingSink {
        async fn publish_reply(&self, _reply: &Reply) -> Result<(), BrokerError> {
            Err(BrokerError::NotRunning)
        }

        async fn publish_raw(&self, _body: &[u8]) -> Result<(), BrokerError> {
            Err(BrokerError::NotRunning)
        }
    }

    let (local, _remote) = UnixStream::pair().unwrap();
    let ctx = JobContext::new(
        RequestId::new(),
        0,
        Arc::new(FailingSink),
        Arc::new(CommandPipe::new(local)),
        false,
    );

    assert!(matches!(
        ctx.publish_progress(0.1, "hello").await,
        Err(JobError::Failed(_))
    ));
}
