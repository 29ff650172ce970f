// Copyright (c) 2024-2025, The cfwave contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License. If
// the BSD 2 Clause License was not distributed with this source code in the
// LICENSE file, you can obtain it at
// https://opensource.org/license/bsd-2-clause

// The asynchronous encoder pool: N worker threads, each owning a
// private encoder instance, fed from a bounded in-order job queue.
//
// Dispatch is round-robin over workers and only advances on key
// frames, so every frame of a GOP lands on the worker holding that
// GOP's temporal state. Samples always come back in submission order:
// the queue head is released only once its job is finished, however
// quickly later workers run.
//
// Each submission captures a deep copy of the pool metadata store, so
// changes made while frames are in flight only affect frames submitted
// afterwards.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use parking_lot::{Condvar, Mutex};

use crate::encoder::{Encoder, EncoderParams};
use crate::error::{CodecError, Result};
use crate::metadata::{MetadataScope, MetadataStore};
use crate::pixel::Quality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
  Encoding,
  Finished,
}

struct JobSlot {
  frame_number: u32,
  status: JobStatus,
  error: Option<CodecError>,
  // The encoded sample; None for the trailing frames of a GOP, whose
  // bytes ride in the sample attached to the GOP head
  sample: Option<Vec<u8>>,
}

struct JobQueue {
  jobs: VecDeque<JobSlot>,
  capacity: usize,
  stopped: bool,
}

struct PoolShared {
  queue: Mutex<JobQueue>,
  // Signalled when a slot frees up
  space: Condvar,
  // Signalled when any job finishes or the pool stops
  ready: Condvar,
  metadata: Mutex<MetadataStore>,
}

enum WorkerMessage {
  Encode {
    frame_number: u32,
    frame: Vec<u8>,
    pitch: usize,
    quality: Quality,
    metadata: MetadataStore,
  },
  Stop,
}

pub struct EncoderPool {
  shared: Arc<PoolShared>,
  senders: Vec<Sender<WorkerMessage>>,
  workers: Vec<JoinHandle<()>>,
  params: EncoderParams,
  // Submission-side bookkeeping; the pool API itself is locked by the
  // queue mutex, these only change under it
  submit_state: Mutex<SubmitState>,
}

struct SubmitState {
  next_frame_number: u32,
  frames_into_gop: usize,
  dispatch_cursor: usize,
}

impl EncoderPool {
  pub fn new(params: EncoderParams, threads: usize, queue_length: usize) -> Result<EncoderPool> {
    if threads == 0 || queue_length == 0 {
      return Err(CodecError::InvalidArgument("pool needs at least one worker and one queue slot"));
    }
    // Validate the parameters once up front so workers cannot fail to
    // prepare
    Encoder::new().prepare(params.clone())?;

    let shared = Arc::new(PoolShared {
      queue: Mutex::new(JobQueue {
        jobs: VecDeque::with_capacity(queue_length),
        capacity: queue_length,
        stopped: false,
      }),
      space: Condvar::new(),
      ready: Condvar::new(),
      metadata: Mutex::new(MetadataStore::new()),
    });

    let mut senders = Vec::with_capacity(threads);
    let mut workers = Vec::with_capacity(threads);
    for index in 0..threads {
      let (sender, receiver) = unbounded();
      let worker_shared = shared.clone();
      let worker_params = params.clone();
      let handle = std::thread::Builder::new()
        .name(format!("cfwave-encoder-{}", index))
        .spawn(move || worker_main(receiver, worker_shared, worker_params))
        .map_err(|_| CodecError::ThreadCreateFailed)?;
      senders.push(sender);
      workers.push(handle);
    }

    info!("encoder pool started with {} workers, queue length {}", threads, queue_length);
    return Ok(EncoderPool {
      shared: shared,
      senders: senders,
      workers: workers,
      params: params,
      submit_state: Mutex::new(SubmitState {
        next_frame_number: 1,
        frames_into_gop: 0,
        dispatch_cursor: 0,
      }),
    });
  }

  // Set or replace one metadata tuple for frames submitted from now on
  pub fn attach_metadata(&self, scope: MetadataScope, tag: [u8; 4], type_code: u8, payload: &[u8]) {
    self.shared.metadata.lock().set(scope, tag, type_code, payload);
  }

  // Submit one frame. Blocks while the job queue is full. Returns the
  // frame number assigned to the submission (counting from 1).
  pub fn submit(&self, frame: &[u8], pitch: usize) -> Result<u32> {
    let quality = self.params.quality;
    return self.submit_with_quality(frame, pitch, quality);
  }

  pub fn submit_with_quality(&self, frame: &[u8], pitch: usize, quality: Quality) -> Result<u32> {
    let mut queue = self.shared.queue.lock();
    while queue.jobs.len() >= queue.capacity && !queue.stopped {
      self.shared.space.wait(&mut queue);
    }
    if queue.stopped {
      return Err(CodecError::InvalidArgument("pool is stopped"));
    }

    let mut state = self.submit_state.lock();
    let frame_number = state.next_frame_number;
    state.next_frame_number += 1;

    // Key frames advance the round-robin cursor; every frame of a GOP
    // follows its head to the same worker
    let key_frame = state.frames_into_gop == 0;
    if key_frame {
      state.dispatch_cursor = (state.dispatch_cursor + 1) % self.senders.len();
    }
    state.frames_into_gop = (state.frames_into_gop + 1) % self.params.gop_length.max(1);
    let worker = state.dispatch_cursor;

    // Snapshot the metadata store and stamp this frame's identity
    let mut snapshot = self.shared.metadata.lock().clone();
    snapshot.ensure_frame_identity(frame_number, self.params.frame_rate);
    // The auto-assigned clip GUID must be shared by later frames too
    if let Some(guid) = snapshot.scope(MetadataScope::Both).get(crate::metadata::TAG_GUID) {
      self
        .shared
        .metadata
        .lock()
        .set(MetadataScope::Both, guid.tag, guid.type_code, &guid.payload);
    }

    queue.jobs.push_back(JobSlot {
      frame_number: frame_number,
      status: JobStatus::Encoding,
      error: None,
      sample: None,
    });
    drop(state);

    // Dispatch under the queue lock so slot order and per-worker
    // message order can never disagree; the channel send is unbounded
    // and does not block
    debug!("dispatching frame {} to worker {}", frame_number, worker);
    self.senders[worker]
      .send(WorkerMessage::Encode {
        frame_number: frame_number,
        frame: frame.to_vec(),
        pitch: pitch,
        quality: quality,
        metadata: snapshot,
      })
      .map_err(|_| CodecError::Internal("worker channel closed"))?;
    return Ok(frame_number);
  }

  // Block until the next sample in submission order is finished.
  // Returns NotFinished only once the pool is stopped and drained.
  pub fn wait_sample(&self) -> Result<(u32, Vec<u8>)> {
    let mut queue = self.shared.queue.lock();
    loop {
      match take_finished_head(&mut queue) {
        HeadState::Sample(frame_number, sample) => {
          self.shared.space.notify_one();
          return Ok((frame_number, sample));
        }
        HeadState::Failed(error) => {
          self.shared.space.notify_one();
          return Err(error);
        }
        HeadState::Consumed => {
          // A GOP trailer with no sample of its own; keep scanning
          self.shared.space.notify_one();
        }
        HeadState::NotReady => {
          if queue.stopped && queue.jobs.is_empty() {
            return Err(CodecError::NotFinished);
          }
          self.shared.ready.wait(&mut queue);
        }
      }
    }
  }

  // Non-blocking retrieval: Ok(None) while the head of the queue is
  // still encoding or the queue is empty
  pub fn test_sample(&self) -> Result<Option<(u32, Vec<u8>)>> {
    let mut queue = self.shared.queue.lock();
    loop {
      match take_finished_head(&mut queue) {
        HeadState::Sample(frame_number, sample) => {
          self.shared.space.notify_one();
          return Ok(Some((frame_number, sample)));
        }
        HeadState::Failed(error) => {
          self.shared.space.notify_one();
          return Err(error);
        }
        HeadState::Consumed => {
          self.shared.space.notify_one();
        }
        HeadState::NotReady => return Ok(None),
      }
    }
  }

  // Stop accepting submissions, let every in-flight job finish, and
  // join the workers. Finished samples remain retrievable afterwards.
  pub fn stop(&mut self) -> Result<()> {
    if self.workers.is_empty() {
      return Ok(());
    }

    for sender in self.senders.iter() {
      // A closed channel means the worker is already gone
      let _ = sender.send(WorkerMessage::Stop);
    }

    {
      let mut queue = self.shared.queue.lock();
      queue.stopped = true;
      self.shared.space.notify_all();
      while queue.jobs.iter().any(|job| job.status != JobStatus::Finished) {
        self.shared.ready.wait(&mut queue);
      }
    }
    self.shared.ready.notify_all();

    for handle in self.workers.drain(..) {
      handle.join().map_err(|_| CodecError::ThreadWaitFailed)?;
    }
    info!("encoder pool stopped");
    return Ok(());
  }
}

impl Drop for EncoderPool {
  fn drop(&mut self) {
    let _ = self.stop();
  }
}

enum HeadState {
  Sample(u32, Vec<u8>),
  Failed(CodecError),
  Consumed,
  NotReady,
}

fn take_finished_head(queue: &mut JobQueue) -> HeadState {
  match queue.jobs.front() {
    Some(head) if head.status == JobStatus::Finished => {
      let slot = queue.jobs.pop_front().unwrap();
      if let Some(error) = slot.error {
        return HeadState::Failed(error);
      }
      match slot.sample {
        Some(sample) => HeadState::Sample(slot.frame_number, sample),
        None => HeadState::Consumed,
      }
    }
    _ => HeadState::NotReady,
  }
}

fn finish_job(shared: &PoolShared, frame_number: u32, sample: Option<Vec<u8>>, error: Option<CodecError>) {
  let mut queue = shared.queue.lock();
  if let Some(slot) = queue.jobs.iter_mut().find(|job| job.frame_number == frame_number) {
    slot.sample = sample;
    slot.error = error;
    slot.status = JobStatus::Finished;
  }
  shared.ready.notify_all();
}

fn worker_main(receiver: Receiver<WorkerMessage>, shared: Arc<PoolShared>, params: EncoderParams) {
  let mut encoder = Encoder::new();
  // Parameters were validated when the pool was built
  encoder.prepare(params).expect("pool parameters changed validity");

  // Frame number of a buffered GOP head whose sample is still owed
  let mut gop_head: Option<u32> = None;

  for message in receiver.iter() {
    match message {
      WorkerMessage::Encode { frame_number, frame, pitch, quality, metadata } => {
        encoder.set_metadata(metadata);
        match encoder.encode_sample_with_quality(&frame, pitch, quality) {
          Ok(Some(sample)) => {
            match gop_head.take() {
              Some(head) => {
                // The pair sample belongs to the GOP head; the
                // trailing frame's slot finishes empty
                finish_job(&shared, head, Some(sample), None);
                finish_job(&shared, frame_number, None, None);
              }
              None => finish_job(&shared, frame_number, Some(sample), None),
            }
          }
          Ok(None) => {
            // Head of a temporal pair, buffered inside the encoder
            gop_head = Some(frame_number);
          }
          Err(error) => {
            if let Some(head) = gop_head.take() {
              finish_job(&shared, head, None, Some(error.clone()));
            }
            finish_job(&shared, frame_number, None, Some(error));
          }
        }
      }
      WorkerMessage::Stop => break,
    }
  }

  // A stream with an odd frame count leaves a buffered GOP head; emit
  // it as a one-frame sample so the job can finish
  if let Some(head) = gop_head.take() {
    match encoder.flush() {
      Ok(Some(sample)) => finish_job(&shared, head, Some(sample), None),
      Ok(None) => finish_job(&shared, head, None, Some(CodecError::Internal("lost GOP head"))),
      Err(error) => finish_job(&shared, head, None, Some(error)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pixel::{EncodedFormat, PixelFormat};
  use crate::sample::parse_sample_header;

  fn pool_params(width: usize, height: usize) -> EncoderParams {
    EncoderParams {
      width: width,
      height: height,
      input_format: PixelFormat::BgraTopDown,
      encoded_format: EncodedFormat::Rgb444,
      ..EncoderParams::default()
    }
  }

  fn test_frame(width: usize, height: usize, seed: u8) -> Vec<u8> {
    (0..width * height * 4).map(|i| (i as u8).wrapping_mul(seed)).collect()
  }

  #[test]
  fn samples_come_back_in_submission_order() {
    let mut pool = EncoderPool::new(pool_params(48, 32), 3, 16).unwrap();
    for i in 0..12 {
      pool.submit(&test_frame(48, 32, i as u8 + 1), 48 * 4).unwrap();
    }
    for expected in 1..=12u32 {
      let (frame_number, sample) = pool.wait_sample().unwrap();
      assert_eq!(frame_number, expected);
      assert!(parse_sample_header(&sample).is_ok());
    }
    pool.stop().unwrap();
    assert_eq!(pool.wait_sample(), Err(CodecError::NotFinished));
  }

  #[test]
  fn stop_drains_without_deadlock() {
    for workers in [1usize, 2, 5] {
      let mut pool = EncoderPool::new(pool_params(32, 32), workers, 8).unwrap();
      for i in 0..6 {
        pool.submit(&test_frame(32, 32, i as u8 + 1), 32 * 4).unwrap();
      }
      pool.stop().unwrap();
      // Every submitted frame is still retrievable after the stop
      let mut count = 0;
      while let Ok((_, _)) = pool.wait_sample() {
        count += 1;
      }
      assert_eq!(count, 6);
    }
  }

  #[test]
  fn gop_pairs_produce_one_sample_per_pair() {
    let mut params = pool_params(32, 32);
    params.gop_length = 2;
    let mut pool = EncoderPool::new(params, 2, 8).unwrap();
    for i in 0..8 {
      pool.submit(&test_frame(32, 32, i as u8 + 1), 32 * 4).unwrap();
    }
    let mut heads = Vec::new();
    for _ in 0..4 {
      let (frame_number, sample) = pool.wait_sample().unwrap();
      assert!(parse_sample_header(&sample).is_ok());
      heads.push(frame_number);
    }
    assert_eq!(heads, vec![1, 3, 5, 7]);
    pool.stop().unwrap();
  }

  #[test]
  fn metadata_changes_do_not_affect_queued_frames() {
    let pool = EncoderPool::new(pool_params(32, 32), 1, 4).unwrap();
    pool.attach_metadata(MetadataScope::Both, *b"TAKE", crate::metadata::TYPE_LONG, &1u32.to_be_bytes());
    pool.submit(&test_frame(32, 32, 1), 32 * 4).unwrap();
    pool.attach_metadata(MetadataScope::Both, *b"TAKE", crate::metadata::TYPE_LONG, &2u32.to_be_bytes());
    pool.submit(&test_frame(32, 32, 2), 32 * 4).unwrap();

    // Both frames encode; the first must carry TAKE=1 even though the
    // store changed while it may still have been queued
    let (_, first) = pool.wait_sample().unwrap();
    let (_, second) = pool.wait_sample().unwrap();

    let mut decoder = crate::decoder::Decoder::new();
    let mut out = vec![0u8; 32 * 32 * 4];
    decoder.prepare_to_decode(&first, PixelFormat::BgraTopDown, crate::pixel::DecodedResolution::Full).unwrap();
    decoder.decode_sample(&first, &mut out, 32 * 4).unwrap();
    let take1 = decoder.metadata().scope(MetadataScope::Both).get(*b"TAKE").unwrap().payload.clone();
    decoder.decode_sample(&second, &mut out, 32 * 4).unwrap();
    let take2 = decoder.metadata().scope(MetadataScope::Both).get(*b"TAKE").unwrap().payload.clone();
    assert_eq!(take1, 1u32.to_be_bytes());
    assert_eq!(take2, 2u32.to_be_bytes());
  }
}
