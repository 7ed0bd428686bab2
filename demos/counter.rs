//! Counter Example - state, passes and bridged clicks
//!
//! This example walks through the core lifecycle of spark-nodes:
//! - Mounting a root component onto a container
//! - Bridging a native click into a typed message
//! - Assigning state and letting the scheduler coalesce the pass
//! - Reconciling a collection of rows by position
//!
//! Run with: cargo run --example counter

use serde_json::{json, Value};
use spark_nodes::{
    events, Component, ListenOptions, MessageKey, MountTarget, NodeCx, RenderCx, Result, Runtime,
};

struct Counter {
    increment: MessageKey,
}

impl Component for Counter {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
        let count = cx.state()["count"].as_i64().unwrap_or_default();
        cx.open("span").text(format!("Count: {}", count)).close();
        cx.open("button");
        cx.on(events::CLICK, self.increment).text("+1").close();
        cx.collection("history")
    }

    fn load(&mut self, cx: &NodeCx<'_>) {
        println!("  load() on node {}", cx.id());
    }
}

struct Entry;

impl Component for Entry {
    fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
        let text = cx.state().as_str().unwrap_or_default().to_string();
        cx.open("li").text(text).close();
        Ok(())
    }
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt().try_init();

    println!("=== spark-nodes Counter Example ===\n");

    let rt = Runtime::new();
    let increment = MessageKey::new("increment");
    let root = rt.mount(Counter { increment }, MountTarget::Id("counter"), json!({"count": 0}))?;
    rt.run_until_stalled()?;

    println!("Initial output:");
    println!("  {}", rt.output(root).unwrap_or_default());

    rt.listen(root, events::CLICK, increment, ListenOptions::default(), |rt, msg| {
        let count = rt.state(msg.current).and_then(|s| s["count"].as_i64()).unwrap_or_default() + 1;
        if let Err(err) = rt.assign_state(msg.current, json!({"count": count})) {
            eprintln!("  assign failed: {}", err);
            return;
        }
        let history: Vec<Value> = (1..=count).map(|n| json!(format!("clicked #{}", n))).collect();
        if let Err(err) = rt.assign_collection(msg.current, "history", || Entry, history) {
            eprintln!("  collection failed: {}", err);
        }
    })?;

    println!("\n--- Clicking three times ---\n");
    for _ in 0..3 {
        let handle = rt.handle(root);
        let button = handle.and_then(|h| rt.with_surface(|s| s.find(h, "button")));
        let Some(button) = button else {
            println!("  button not rendered");
            break;
        };
        let delivered = rt.dispatch_native(button, events::CLICK);
        rt.run_until_stalled()?;
        println!("  delivered to {} handler(s), frame {:?}", delivered, rt.frame(root));
    }

    println!("\nAfter clicks:");
    println!("  state: {}", rt.state(root).unwrap_or(Value::Null));
    println!("  text:  {}", rt.text(root).unwrap_or_default());

    println!("\n--- Re-assigning the same state ---\n");
    let changed = rt.assign_state(root, json!({"count": 3}))?;
    println!("  changed: {}, pass pending: {}", changed, rt.is_pass_pending(root));

    rt.unmount(root)?;
    println!("\nUnmounted, {} node(s) left", rt.node_count());

    println!("\n=== Example Complete ===");
    Ok(())
}
