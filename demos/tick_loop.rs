use std::sync::Arc;
use std::time::Duration;

use tickvisor::{
    impl_event, priority, CancellableEvent, Config, EventFlags, HandlerError, ListenerRef,
    LogWriter, Runtime, Subscribe, SuspendSpec, TaskError, Toggle, TICKS_PER_SECOND,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Default)]
struct Attack {
    flags: EventFlags,
    target: u32,
}
impl_event!(Attack, cancellable);

#[derive(Clone, Default)]
struct ChatSend {
    flags: EventFlags,
    message: String,
}
impl_event!(ChatSend, cancellable);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let rt = Runtime::builder(Config::default())
        .event::<Attack>("attack")
        .event::<ChatSend>("chatSend")
        .with_subscribers(subs)
        .build()?;

    // Cancels attacks on even targets, fails on target 13.
    let guard = Toggle::new("anti-bot");
    let guard_ref: ListenerRef = guard.clone();
    rt.events()
        .handler(&guard_ref, priority::SAFETY, |ev: &mut Attack| {
            if ev.target == 13 {
                return Err(HandlerError::fail("unlucky target"));
            }
            if ev.target % 2 == 0 {
                ev.cancel_event().ok();
            }
            Ok(())
        })?;

    // Follows every attack with a delayed message.
    let criticals: ListenerRef = Toggle::new("criticals");
    let chat = Arc::clone(&rt);
    rt.sequence_handler(&criticals, priority::NORMAL, move |seq, ev: Attack| {
        let chat = Arc::clone(&chat);
        async move {
            seq.wait_ticks(5).await;
            chat.dispatch(ChatSend {
                message: format!("hit {} five ticks ago", ev.target),
                ..Default::default()
            })
            .map_err(|err| TaskError::fail(err.to_string()))?;
            Ok(())
        }
    })?;

    // Prints chat messages one at a time.
    let echo: ListenerRef = Toggle::new("echo");
    rt.events()
        .suspend_handler(&echo, SuspendSpec::ordered(), |ev: ChatSend| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            println!("chat: {}", ev.message);
            Ok(())
        })?;

    let mut clock = tokio::time::interval(Duration::from_secs(1) / TICKS_PER_SECOND);
    for n in 0..(2 * TICKS_PER_SECOND) {
        clock.tick().await;
        if n % 4 == 0 {
            let ev = rt.dispatch(Attack {
                target: 10 + n / 4,
                ..Default::default()
            })?;
            if ev.is_cancelled() {
                println!("attack on {} blocked", ev.target);
            }
        }
        if n == TICKS_PER_SECOND {
            guard.disable();
        }
        rt.tick();
    }

    rt.shutdown().await;
    Ok(())
}
