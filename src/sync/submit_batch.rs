use std::sync::Arc;

use anyhow::Result;

use crate::graph::pass_graph::GraphExecuteInfo;
use crate::graph::QueueType;
use crate::rhi::{CommandBuffer, Device, Fence, QueueSubmitInfo, Semaphore};

#[derive(Debug)]
struct SubmitInfo {
    queue: QueueType,
    /// Index of the command buffer in the list passed to [`SubmitBatch::finish`]. Empty submissions only wait and signal.
    cmd: Option<usize>,
    wait_semaphores: Vec<Arc<dyn Semaphore>>,
    signal_semaphores: Vec<Arc<dyn Semaphore>>,
    signal_fence: Option<Arc<dyn Fence>>,
}

/// A handle to a submit inside a batch.
/// Can be used to make submits wait on other submits inside a single batch
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubmitHandle {
    index: usize,
}

/// A batch of queue submissions that possibly wait on each other using semaphores.
///
/// Every dependency between two submissions gets its own binary semaphore, signaled by the earlier and waited on by the
/// later submission. Submissions are made in the order they were added to the batch.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SubmitBatch {
    #[derivative(Debug = "ignore")]
    device: Arc<dyn Device>,
    submits: Vec<SubmitInfo>,
    semaphores: Vec<Arc<dyn Semaphore>>,
}

impl SubmitBatch {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            submits: vec![],
            semaphores: vec![],
        }
    }

    /// Add a submission with no dependencies on other submissions in this batch.
    pub fn submit(&mut self, queue: QueueType, cmd: Option<usize>) -> SubmitHandle {
        self.submits.push(SubmitInfo {
            queue,
            cmd,
            wait_semaphores: vec![],
            signal_semaphores: vec![],
            signal_fence: None,
        });
        SubmitHandle {
            index: self.submits.len() - 1,
        }
    }

    /// Add a submission that waits for each submission in `handles`.
    /// # Errors
    /// * Fails if the device cannot create a semaphore.
    pub fn submit_after(&mut self, handles: &[SubmitHandle], queue: QueueType, cmd: Option<usize>) -> Result<SubmitHandle> {
        let mut wait_semaphores = Vec::with_capacity(handles.len());
        for handle in handles {
            let semaphore = self.device.create_semaphore()?;
            self.submits[handle.index].signal_semaphores.push(semaphore.clone());
            self.semaphores.push(semaphore.clone());
            wait_semaphores.push(semaphore);
        }
        let handle = self.submit(queue, cmd);
        self.submits[handle.index].wait_semaphores = wait_semaphores;
        Ok(handle)
    }

    /// Make a submission also wait on semaphores from outside the batch.
    pub fn wait_external(&mut self, handle: SubmitHandle, semaphores: &[Arc<dyn Semaphore>]) {
        self.submits[handle.index].wait_semaphores.extend(semaphores.iter().cloned());
    }

    /// Make a submission also signal semaphores and a fence from outside the batch.
    pub fn signal_external(&mut self, handle: SubmitHandle, semaphores: &[Arc<dyn Semaphore>], fence: Option<Arc<dyn Fence>>) {
        let submit = &mut self.submits[handle.index];
        submit.signal_semaphores.extend(semaphores.iter().cloned());
        submit.signal_fence = fence;
    }

    /// Amount of submissions in this batch.
    pub fn len(&self) -> usize {
        self.submits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submits.is_empty()
    }

    /// Finish this batch by submitting every submission to its queue.
    /// Returns the semaphores created by the batch. They must be kept alive until the submissions completed.
    /// # Errors
    /// * Fails if a queue is missing or a submission fails. Submissions before the failing one were made.
    pub fn finish(self, command_buffers: &[Box<dyn CommandBuffer>]) -> Result<Vec<Arc<dyn Semaphore>>> {
        for submit in &self.submits {
            let queue = self.device.queue(submit.queue.rhi_queue())?;
            let cmd = match submit.cmd {
                Some(index) => Some(
                    command_buffers
                        .get(index)
                        .ok_or(crate::Error::Uncategorized("Submission refers to a command buffer that was not recorded"))?
                        .as_ref(),
                ),
                None => None,
            };
            queue.submit(
                cmd,
                &QueueSubmitInfo {
                    wait_semaphores: submit.wait_semaphores.clone(),
                    signal_semaphores: submit.signal_semaphores.clone(),
                    signal_fence: submit.signal_fence.clone(),
                },
            )?;
            trace!(
                "Submitted to {:?}: waits {}, signals {}",
                submit.queue,
                submit.wait_semaphores.len(),
                submit.signal_semaphores.len()
            );
        }
        Ok(self.semaphores)
    }
}

impl SubmitHandle {
    /// Add another submit to the batch that waits on this submit.
    pub fn then(&self, queue: QueueType, cmd: Option<usize>, batch: &mut SubmitBatch) -> Result<SubmitHandle> {
        batch.submit_after(std::slice::from_ref(self), queue, cmd)
    }
}

/// Submit the command buffers of a recorded graph, one timeline segment after another.
///
/// Every submission of a segment waits for every submission of the previous segment. The caller's wait semaphores are
/// waited on by the first segment, through an empty submission on the main queue that the segment's submissions wait on
/// if it spans more than one queue. The caller's signal semaphores and fence are signaled by the last segment, through an
/// empty submission on the main queue if it spans more than one queue or its only queue is not the main queue.
/// Without any segment, a single empty submission on the main queue waits and signals.
pub(crate) fn submit_segments(
    device: Arc<dyn Device>,
    segments: &[Vec<(QueueType, usize)>],
    command_buffers: &[Box<dyn CommandBuffer>],
    info: &GraphExecuteInfo,
) -> Result<Vec<Arc<dyn Semaphore>>> {
    let mut batch = SubmitBatch::new(device);

    if segments.is_empty() {
        let handle = batch.submit(QueueType::Main, None);
        batch.wait_external(handle, &info.wait_semaphores);
        batch.signal_external(handle, &info.signal_semaphores, info.signal_fence.clone());
        return batch.finish(command_buffers);
    }

    let mut previous: Vec<SubmitHandle> = vec![];
    for (index, segment) in segments.iter().enumerate() {
        let first = index == 0;
        if first && segment.len() > 1 && !info.wait_semaphores.is_empty() {
            let fork = batch.submit(QueueType::Main, None);
            batch.wait_external(fork, &info.wait_semaphores);
            previous = vec![fork];
        }

        let mut handles = Vec::with_capacity(segment.len());
        for (queue, cmd) in segment {
            let handle = batch.submit_after(&previous, *queue, Some(*cmd))?;
            if first && segment.len() == 1 {
                batch.wait_external(handle, &info.wait_semaphores);
            }
            handles.push(handle);
        }
        previous = handles;
    }

    let last = &segments[segments.len() - 1];
    match last.as_slice() {
        [(QueueType::Main, _)] => {
            batch.signal_external(previous[0], &info.signal_semaphores, info.signal_fence.clone());
        }
        _ => {
            let join = batch.submit_after(&previous, QueueType::Main, None)?;
            batch.signal_external(join, &info.signal_semaphores, info.signal_fence.clone());
        }
    }

    debug!("Submitting {} timeline segments in {} submissions", segments.len(), batch.len());
    batch.finish(command_buffers)
}
