use image::RgbImage;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Could not open video: {0}")]
    Open(String),
    #[error("Failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },
}

/// Forward-only source of decoded frames.
pub trait FrameSource {
    /// Decodes the next frame, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SamplerError>;

    /// Advances past the next frame without materializing it. Returns `false`
    /// at end of stream.
    fn skip_frame(&mut self) -> Result<bool, SamplerError> {
        Ok(self.next_frame()?.is_some())
    }
}

#[derive(Debug)]
pub struct SampledFrame {
    pub index: usize,
    pub image: RgbImage,
}

/// Yields frames 0, N, 2N, ... of a source.
///
/// Frame 0 is only released once the stream has proven to hold at least N
/// frames, so a clip shorter than the stride yields nothing. A decode error
/// is yielded once and ends the sequence.
pub struct FrameSampler<S> {
    source: S,
    stride: usize,
    position: usize,
    pending_skip: usize,
    done: bool,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, stride: usize) -> Self {
        Self {
            source,
            stride: stride.max(1),
            position: 0,
            pending_skip: 0,
            done: false,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Skips `count` frames; `Ok(false)` when the stream ends first.
    fn skip(&mut self, count: usize) -> Result<bool, SamplerError> {
        for _ in 0..count {
            if !self.source.skip_frame()? {
                return Ok(false);
            }
            self.position += 1;
        }
        Ok(true)
    }

    fn advance(&mut self) -> Result<Option<SampledFrame>, SamplerError> {
        let skip = std::mem::take(&mut self.pending_skip);
        if !self.skip(skip)? {
            return Ok(None);
        }

        let Some(image) = self.source.next_frame()? else {
            return Ok(None);
        };
        let index = self.position;
        self.position += 1;

        if index == 0 {
            if !self.skip(self.stride - 1)? {
                log::debug!(
                    "Video has fewer than {} frames, nothing to sample",
                    self.stride
                );
                return Ok(None);
            }
        } else {
            self.pending_skip = self.stride - 1;
        }

        Ok(Some(SampledFrame { index, image }))
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = Result<SampledFrame, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;

    /// In-memory clip whose frame `i` is filled with gray level `i % 256`.
    pub(crate) struct SyntheticClip {
        pub total: usize,
        pub next: usize,
        pub fail_at: Option<usize>,
        pub decoded: usize,
    }

    impl SyntheticClip {
        pub fn new(total: usize) -> Self {
            Self {
                total,
                next: 0,
                fail_at: None,
                decoded: 0,
            }
        }
    }

    impl FrameSource for SyntheticClip {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, SamplerError> {
            if self.fail_at == Some(self.next) {
                return Err(SamplerError::Decode {
                    index: self.next,
                    reason: "corrupt packet".into(),
                });
            }
            if self.next >= self.total {
                return Ok(None);
            }
            let level = (self.next % 256) as u8;
            self.next += 1;
            self.decoded += 1;
            Ok(Some(RgbImage::from_pixel(8, 8, Rgb([level, level, level]))))
        }

        fn skip_frame(&mut self) -> Result<bool, SamplerError> {
            if self.fail_at == Some(self.next) {
                return Err(SamplerError::Decode {
                    index: self.next,
                    reason: "corrupt packet".into(),
                });
            }
            if self.next >= self.total {
                return Ok(false);
            }
            self.next += 1;
            Ok(true)
        }
    }

    fn indices(total: usize, stride: usize) -> Vec<usize> {
        FrameSampler::new(SyntheticClip::new(total), stride)
            .map(|frame| frame.unwrap().index)
            .collect()
    }

    #[test]
    fn samples_every_nth_frame() {
        assert_eq!(indices(200, 60), vec![0, 60, 120, 180]);
        assert_eq!(indices(180, 60), vec![0, 60, 120]);
        assert_eq!(indices(5, 1), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clip_shorter_than_stride_yields_nothing() {
        assert!(indices(59, 60).is_empty());
        assert!(indices(0, 60).is_empty());
        assert_eq!(indices(60, 60), vec![0]);
    }

    #[test]
    fn intervening_frames_are_not_decoded() {
        let mut sampler = FrameSampler::new(SyntheticClip::new(200), 60);
        let frames: Vec<_> = sampler.by_ref().collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(sampler.source.decoded, 4);
    }

    #[test]
    fn frame_content_matches_index() {
        let frames: Vec<_> = FrameSampler::new(SyntheticClip::new(130), 60)
            .map(Result::unwrap)
            .collect();
        assert_eq!(frames[1].image.get_pixel(0, 0), &Rgb([60, 60, 60]));
        assert_eq!(frames[2].image.get_pixel(0, 0), &Rgb([120, 120, 120]));
    }

    #[test]
    fn decode_error_ends_sequence() {
        let mut clip = SyntheticClip::new(200);
        clip.fail_at = Some(100);
        let results: Vec<_> = FrameSampler::new(clip, 60).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(SamplerError::Decode { index: 100, .. })));
    }

    #[test]
    fn zero_stride_is_treated_as_one() {
        let sampler = FrameSampler::new(SyntheticClip::new(3), 0);
        assert_eq!(sampler.stride(), 1);
        assert_eq!(sampler.count(), 3);
    }
}
