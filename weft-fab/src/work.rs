//! Work cycle: the continuous look-ahead fabrication loop
//!
//! A timed tokio loop keeps a horizon of fabricated-and-dubbed segments
//! ahead of elapsed chain time. Each tick, segments are planned at the next
//! offset, crafted through the pipeline, dubbed through the mixer, and
//! handed to the shipping collaborators, until the fabricated end passes
//! the horizon. The loop never blocks inside a craft beyond one segment's
//! step: shutdown is observed between segments, and a failed segment parks
//! the chain at its offset until an operator clears it — the next scheduled
//! attempt at the same offset is the only retry.

use crate::cache::AudioCache;
use crate::config::FabConfig;
use crate::craft;
use crate::error::{Error, Result};
use crate::fabricator::{Fabricator, Retrospective, SegmentRecords};
use crate::mix::{Mixer, OutputBuffer, OutputFormat};
use crate::ship::{AudioShipper, SegmentSink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use weft_common::content::ContentSnapshot;
use weft_common::meme::MemeStack;
use weft_common::segment::{MessageSeverity, Segment, SegmentMessage, SegmentState};
use weft_common::timing::seconds_to_micros;

/// What one fabrication attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Segment at this offset reached `Dubbed`
    Dubbed(u64),
    /// Segment at this offset reached `Failed`; the chain parks here
    Failed(u64),
}

/// Mutable chain position, guarded by one lock
struct ChainState {
    next_offset: u64,
    /// End of the last dubbed segment on the chain timeline, microseconds
    fabricated_end_micros: i64,
    /// Frozen records of the last dubbed segment, for the retrospective
    prior: Option<SegmentRecords>,
    /// Offset parked on a failure, until externally cleared
    failed_offset: Option<u64>,
}

/// The continuous fabrication loop for one chain
pub struct WorkCycle {
    chain_id: Uuid,
    config: FabConfig,
    content: Arc<ContentSnapshot>,
    meme_stack: Arc<MemeStack>,
    cache: Arc<AudioCache>,
    sink: Arc<dyn SegmentSink>,
    shipper: Arc<dyn AudioShipper>,
    chain: Mutex<ChainState>,
    running: Arc<RwLock<bool>>,
    last_cycle: RwLock<Instant>,
}

impl WorkCycle {
    pub fn new(
        chain_id: Uuid,
        config: FabConfig,
        content: Arc<ContentSnapshot>,
        meme_stack: Arc<MemeStack>,
        cache: Arc<AudioCache>,
        sink: Arc<dyn SegmentSink>,
        shipper: Arc<dyn AudioShipper>,
    ) -> Self {
        Self {
            chain_id,
            config,
            content,
            meme_stack,
            cache,
            sink,
            shipper,
            chain: Mutex::new(ChainState {
                next_offset: 0,
                fabricated_end_micros: 0,
                prior: None,
                failed_offset: None,
            }),
            running: Arc::new(RwLock::new(false)),
            last_cycle: RwLock::new(Instant::now()),
        }
    }

    /// Start the background loop
    pub async fn start(self: Arc<Self>) {
        info!("starting work cycle for chain {}", self.chain_id);
        *self.running.write().await = true;

        tokio::spawn(async move {
            self.work_loop().await;
        });
    }

    /// Stop cooperatively; the loop exits at the next step boundary
    pub async fn stop(&self) {
        info!("stopping work cycle for chain {}", self.chain_id);
        *self.running.write().await = false;
    }

    /// A cycle that has not completed within the stale threshold is
    /// unhealthy; it is reported, never force-killed
    pub async fn healthy(&self) -> bool {
        self.last_cycle.read().await.elapsed().as_secs_f64()
            < self.config.work.health_stale_seconds
    }

    /// Offset the chain is parked on after a failure, if any
    pub async fn failed_offset(&self) -> Option<u64> {
        self.chain.lock().await.failed_offset
    }

    /// Operator acknowledgement of a failed segment; the next cycle
    /// re-attempts the same offset
    pub async fn clear_failed(&self) {
        let mut chain = self.chain.lock().await;
        if let Some(offset) = chain.failed_offset.take() {
            info!("failed segment at offset {} cleared; will re-attempt", offset);
        }
    }

    /// End of fabricated audio on the chain timeline, microseconds
    pub async fn fabricated_until(&self) -> i64 {
        self.chain.lock().await.fabricated_end_micros
    }

    async fn work_loop(&self) {
        let started = Instant::now();
        let mut tick = interval(Duration::from_millis(self.config.work.cycle_millis));

        loop {
            tick.tick().await;

            if !*self.running.read().await {
                debug!("work loop stopping");
                break;
            }

            let elapsed_micros = started.elapsed().as_micros() as i64;
            if let Err(e) = self.run_cycle(elapsed_micros).await {
                error!("work cycle error: {}", e);
            }
            *self.last_cycle.write().await = Instant::now();
        }
    }

    /// One tick's work: fabricate until the horizon is covered
    ///
    /// `elapsed_micros` is how far the chain clock has advanced; the loop
    /// keeps `fabricated_end` at least the work-ahead window past it.
    pub async fn run_cycle(&self, elapsed_micros: i64) -> Result<()> {
        if self.failed_offset().await.is_some() {
            debug!("chain parked on a failed segment; waiting for clear");
            return Ok(());
        }

        let horizon = elapsed_micros + seconds_to_micros(self.config.work.ahead_seconds);
        while self.fabricated_until().await < horizon {
            // cancellable at segment granularity, never mid-craft
            if !*self.running.read().await {
                break;
            }
            if let Advance::Failed(_) = self.advance_once().await? {
                break;
            }
        }
        Ok(())
    }

    /// Plan, craft, dub, and ship the next segment
    pub async fn advance_once(&self) -> Result<Advance> {
        let mut chain = self.chain.lock().await;
        let offset = chain.next_offset;

        let mut planned = Segment::planned(self.chain_id, offset, chain.fabricated_end_micros);
        planned.duration_micros =
            seconds_to_micros(self.config.work.fallback_segment_seconds);
        planned.waveform_key = format!("{}-{:06}.wav", self.chain_id, offset);

        let retrospective = match chain.prior.clone() {
            Some(records) => Retrospective::from_committed(records)?,
            None => Retrospective::empty(),
        };

        // craft
        let mut records = match self.craft_segment(planned, retrospective) {
            Ok(records) => records,
            Err(failed) => {
                warn!("segment {} failed during craft", offset);
                chain.failed_offset = Some(offset);
                chain.prior = None;
                self.sink.ship_records(&failed)?;
                return Ok(Advance::Failed(offset));
            }
        };

        // dub
        match self.dub(&mut records).await {
            Ok(buffer) => {
                records.segment.transition(SegmentState::Dubbed)?;
                self.shipper
                    .ship_audio(&records.segment.waveform_key, &buffer)?;
                self.sink.ship_records(&records)?;
                debug!(
                    "segment {} dubbed: {} picks, {}µs",
                    offset,
                    records.picks.len(),
                    records.segment.duration_micros
                );
                chain.fabricated_end_micros = records.segment.end_micros();
                chain.next_offset += 1;
                chain.prior = Some(records);
                Ok(Advance::Dubbed(offset))
            }
            Err(e) => {
                warn!("segment {} failed during dub: {}", offset, e);
                let _ = records.segment.transition(SegmentState::Failed);
                records.messages.push(SegmentMessage {
                    id: Uuid::new_v4(),
                    segment_id: records.segment.id,
                    severity: MessageSeverity::Error,
                    body: format!("dub failed: {}", e),
                });
                chain.failed_offset = Some(offset);
                chain.prior = None;
                self.sink.ship_records(&records)?;
                Ok(Advance::Failed(offset))
            }
        }
    }

    /// Run the craft pipeline for one planned segment
    ///
    /// A fabrication error yields the failed record set as the `Err` value
    /// so the caller can ship it; the error itself is already inside the
    /// records as an error-severity message.
    fn craft_segment(
        &self,
        planned: Segment,
        retrospective: Retrospective,
    ) -> std::result::Result<SegmentRecords, SegmentRecords> {
        let fallback = planned.clone();
        let mut fab =
            match Fabricator::new(&self.content, &self.meme_stack, planned, retrospective) {
                Ok(fab) => fab,
                Err(e) => return Err(failed_records(fallback, &e.to_string())),
            };
        match craft::run_pipeline(&mut fab) {
            Ok(()) => match fab.commit() {
                Ok(records) => Ok(records),
                Err(e) => Err(failed_records(fallback, &e.to_string())),
            },
            Err(e) => Err(fab.fail(&e.to_string())),
        }
    }

    /// Render one crafted segment's picks through the mixer
    async fn dub(&self, records: &mut SegmentRecords) -> Result<OutputBuffer> {
        records.segment.transition(SegmentState::Dubbing)?;

        let format = OutputFormat::new(
            self.config.output.frame_rate,
            self.config.output.channels,
            self.config.output.bit_depth,
        )?;
        let mut mixer = Mixer::new(
            format,
            records.segment.duration_micros,
            self.config.mix.fade_micros,
        )?;

        for pick in &records.picks {
            let audio = self.content.audio(pick.audio_id).ok_or_else(|| {
                Error::Fabrication(format!(
                    "pick references audio {} missing from content",
                    pick.audio_id
                ))
            })?;
            let item = self.cache.get(audio).await?;
            mixer.put(
                item.source(),
                pick.start_micros,
                pick.length_micros,
                pick.amplitude as f32,
                0.0,
            )?;
        }
        mixer.mix()
    }
}

/// Failed record set for a segment that never got a fabricator
fn failed_records(mut segment: Segment, reason: &str) -> SegmentRecords {
    let _ = segment.transition(SegmentState::Failed);
    let message = SegmentMessage {
        id: Uuid::new_v4(),
        segment_id: segment.id,
        severity: MessageSeverity::Error,
        body: reason.to_string(),
    };
    SegmentRecords {
        segment,
        choices: vec![],
        arrangements: vec![],
        picks: vec![],
        chords: vec![],
        memes: vec![],
        messages: vec![message],
    }
}
