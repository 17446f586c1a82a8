//! Producer/consumer routines over a [`Channel`], and a two-thread runner.
use std::panic::resume_unwind;
use std::thread::{Builder, ScopedJoinHandle};

use coro::Generator;

use crate::{Channel, ChannelConfig, Error, Result};

/// Shuts the channel down when a routine ends, however it ends.
struct ShutdownOnDrop<'c, T>(&'c Channel<T>);

impl<T> Drop for ShutdownOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// A routine that forwards every value of `source` into `channel`.
///
/// Each step hands exactly one value over and produces `()` once it has been
/// taken. When `source` completes the channel is closed and the routine
/// returns the number of values handed over. If the consumer goes away before
/// taking a value, it returns [`Error::Disconnected`] or
/// [`Error::SendAfterClose`].
pub fn producer<'c, 'g: 'c, T, R>(
    mut source: Generator<'g, T, R>,
    channel: &'c Channel<T>,
) -> Generator<'c, (), Result<usize>>
where
    T: Send + 'g,
    R: Send + 'g,
{
    Generator::new(move |co| async move {
        let _shutdown = ShutdownOnDrop(channel);
        let mut sent = 0usize;
        while let Some(value) = source.next() {
            channel.send(value).await?;
            sent += 1;
            co.produce(()).await;
        }
        // A consumer dropped right after the last handoff may have shut the
        // channel down already; every value was taken by then.
        if let Err(Error::AlreadyClosed) = channel.close() {
            log::debug!("{}: consumer closed first", channel.name());
        }
        log::trace!("{}: producer done after {sent} values", channel.name());
        Ok::<usize, Error>(sent)
    })
}

/// A routine producing every value received from `channel`, completing at
/// the end of the stream.
///
/// Dropping it early shuts the channel down, which unblocks the producer.
pub fn consumer<'c, T: Send + 'c>(channel: &'c Channel<T>) -> Generator<'c, T> {
    Generator::new(move |co| async move {
        let _shutdown = ShutdownOnDrop(channel);
        while let Some(value) = channel.receive().await {
            co.produce(value).await;
        }
        log::trace!("{}: consumer reached end of stream", channel.name());
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub sent: usize,
    pub received: usize,
}

/// Runs `source` on a producer thread and feeds `sink` on a consumer thread.
pub fn run<'g, T, R, F>(source: Generator<'g, T, R>, sink: F) -> Result<Report>
where
    T: Send + 'g,
    R: Send + 'g,
    F: FnMut(T) + Send,
{
    run_with(ChannelConfig::default(), source, sink)
}

/// Like [`run`], with an explicit channel configuration.
///
/// Both threads are joined before returning. A panic on either thread is
/// re-raised here once the other side has been unblocked.
pub fn run_with<'g, T, R, F>(
    config: ChannelConfig,
    source: Generator<'g, T, R>,
    mut sink: F,
) -> Result<Report>
where
    T: Send + 'g,
    R: Send + 'g,
    F: FnMut(T) + Send,
{
    let channel = Channel::with_config(config);
    let name = channel.name().to_owned();
    std::thread::scope(|s| {
        let chan = &channel;
        let producer_thread = Builder::new()
            .name(format!("{name}-producer"))
            .spawn_scoped(s, move || {
                producer(source, chan)
                    .drain()
                    .expect("a completed routine has an output")
            })?;
        let consumer_thread = match Builder::new()
            .name(format!("{name}-consumer"))
            .spawn_scoped(s, move || {
                let mut received = 0usize;
                for value in consumer(chan) {
                    sink(value);
                    received += 1;
                }
                received
            }) {
            Ok(handle) => handle,
            Err(err) => {
                chan.shutdown();
                return Err(Error::Spawn(err));
            }
        };
        let sent = join(producer_thread);
        let received = join(consumer_thread);
        log::debug!("{name}: sent {sent:?}, received {received}");
        Ok(Report {
            sent: sent?,
            received,
        })
    })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(cause) => resume_unwind(cause),
    }
}
