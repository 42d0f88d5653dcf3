//! Resource-tracking backend
//!
//! `TrackingGpu` implements [`Gpu`] without touching any hardware. It keeps
//! the bookkeeping a leak or ordering test needs:
//!
//! - the live set of handles per kind, plus creation counts
//! - release violations (double or unknown release) and feedback loops
//! - an ordered log of binds, clears, draws, blits and buffer writes
//! - buffer bytes and vertex array layouts as uploaded
//! - a solid-colour model of every image, so blits and draws can be followed
//!
//! Cloning shares the state, so a test keeps one clone for inspection and
//! hands the other to a [`GpuDevice`](super::GpuDevice).

use super::error::GpuError;
use super::handle::*;
use super::reflect::ProgramInfo;
use super::uniform::UniformValue;
use super::*;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    Created {
        kind: ResourceKind,
        raw: u32,
    },
    Released {
        kind: ResourceKind,
        raw: u32,
    },
    BindFramebuffer(Option<FramebufferId>),
    SetRenderState(RenderState),
    Clear {
        framebuffer: Option<FramebufferId>,
        color: [f32; 4],
    },
    Draw {
        framebuffer: Option<FramebufferId>,
        program: ProgramId,
        primitive: Primitive,
        range: DrawRange,
        textures: Vec<TextureId>,
        state: RenderState,
        viewport: Rect,
    },
    Blit(BlitDesc),
    BufferWrite {
        buffer: BufferId,
        offset: u64,
        len: usize,
    },
}

impl GpuEvent {
    /// Framebuffer this command writes pixels to, if it writes any.
    /// `Some(None)` is the default framebuffer.
    pub fn written_framebuffer(&self) -> Option<Option<FramebufferId>> {
        match self {
            GpuEvent::Clear { framebuffer, .. } | GpuEvent::Draw { framebuffer, .. } => {
                Some(*framebuffer)
            }
            GpuEvent::Blit(desc) => Some(desc.dst),
            _ => None,
        }
    }
}

struct BufferRecord {
    desc: BufferDesc,
    data: Vec<u8>,
}

struct ProgramRecord {
    info: Rc<ProgramInfo>,
    bound_blocks: HashMap<u32, BufferId>,
    loose: HashMap<String, UniformValue>,
}

struct TrackingState {
    limits: GpuLimits,
    next_id: u32,
    live: HashMap<ResourceKind, BTreeSet<u32>>,
    created: HashMap<ResourceKind, usize>,
    violations: Vec<String>,
    events: Vec<GpuEvent>,
    fail_next: HashSet<ResourceKind>,
    buffers: HashMap<BufferId, BufferRecord>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayDesc>,
    textures: HashMap<TextureId, TextureDesc>,
    renderbuffers: HashMap<RenderbufferId, RenderbufferDesc>,
    framebuffers: HashMap<FramebufferId, FramebufferDesc>,
    programs: HashMap<ProgramId, ProgramRecord>,
    content: HashMap<Attachment, [f32; 4]>,
    screen: [f32; 4],
    has_screen: bool,
    bound: Option<FramebufferId>,
    viewport: Rect,
    state: RenderState,
}

impl TrackingState {
    fn new(limits: GpuLimits) -> Self {
        Self {
            limits,
            next_id: 1,
            live: HashMap::new(),
            created: HashMap::new(),
            violations: Vec::new(),
            events: Vec::new(),
            fail_next: HashSet::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            content: HashMap::new(),
            screen: [0.0; 4],
            has_screen: true,
            bound: None,
            viewport: Rect::default(),
            state: RenderState::default(),
        }
    }

    fn allocate<H: Handle>(&mut self) -> Result<H, GpuError> {
        if self.fail_next.remove(&H::KIND) {
            return Err(GpuError::OutOfMemory(H::KIND));
        }
        let raw = self.next_id;
        self.next_id += 1;
        self.live.entry(H::KIND).or_default().insert(raw);
        *self.created.entry(H::KIND).or_default() += 1;
        self.events.push(GpuEvent::Created { kind: H::KIND, raw });
        Ok(H::from_raw(raw))
    }

    fn release<H: Handle>(&mut self, handle: H) -> Result<(), GpuError> {
        let removed = self
            .live
            .get_mut(&H::KIND)
            .map(|set| set.remove(&handle.raw()))
            .unwrap_or(false);
        if !removed {
            self.violations
                .push(format!("release of dead or unknown handle {handle:?}"));
            return Err(GpuError::unknown(handle));
        }
        self.events.push(GpuEvent::Released {
            kind: H::KIND,
            raw: handle.raw(),
        });
        Ok(())
    }

    fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.live
            .get(&H::KIND)
            .is_some_and(|set| set.contains(&handle.raw()))
    }

    fn require<H: Handle>(&self, handle: H) -> Result<(), GpuError> {
        if self.is_live(handle) {
            Ok(())
        } else {
            Err(GpuError::unknown(handle))
        }
    }

    fn describe(&self, attachment: Attachment) -> Result<(u32, u32, u32, TextureFormat), GpuError> {
        match attachment {
            Attachment::Texture(id) => self
                .textures
                .get(&id)
                .map(|d| (d.width, d.height, 1, d.format))
                .ok_or_else(|| GpuError::unknown(id)),
            Attachment::Renderbuffer(id) => self
                .renderbuffers
                .get(&id)
                .map(|d| (d.width, d.height, d.samples, d.format))
                .ok_or_else(|| GpuError::unknown(id)),
        }
    }

    /// Color attachments of the bound target; empty for the default framebuffer.
    fn bound_color(&self) -> Vec<Attachment> {
        self.bound
            .and_then(|fb| self.framebuffers.get(&fb))
            .map(|desc| desc.color.clone())
            .unwrap_or_default()
    }

    fn write_color(&mut self, framebuffer: Option<FramebufferId>, color: [f32; 4]) {
        match framebuffer.and_then(|fb| self.framebuffers.get(&fb)) {
            Some(desc) => {
                for attachment in desc.color.clone() {
                    self.content.insert(attachment, color);
                }
            }
            None => self.screen = color,
        }
    }
}

/// Resource-tracking [`Gpu`] implementation.
#[derive(Clone)]
pub struct TrackingGpu {
    state: Rc<RefCell<TrackingState>>,
}

impl Default for TrackingGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingGpu {
    pub fn new() -> Self {
        Self::with_limits(GpuLimits::default())
    }

    pub fn with_limits(limits: GpuLimits) -> Self {
        Self {
            state: Rc::new(RefCell::new(TrackingState::new(limits))),
        }
    }

    /// Make the next allocation of `kind` fail.
    pub fn fail_next(&self, kind: ResourceKind) {
        self.state.borrow_mut().fail_next.insert(kind);
    }

    /// Simulate a headless device with no window surface.
    pub fn set_default_framebuffer_available(&self, available: bool) {
        self.state.borrow_mut().has_screen = available;
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.state.borrow().live.get(&kind).map_or(0, BTreeSet::len)
    }

    pub fn total_live(&self) -> usize {
        self.state.borrow().live.values().map(BTreeSet::len).sum()
    }

    pub fn created_count(&self, kind: ResourceKind) -> usize {
        self.state.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.state.borrow().created.values().sum()
    }

    pub fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.state.borrow().is_live(handle)
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map(|record| record.data.clone())
    }

    pub fn buffer_desc(&self, buffer: BufferId) -> Option<BufferDesc> {
        self.state.borrow().buffers.get(&buffer).map(|record| record.desc)
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayId) -> Option<VertexArrayDesc> {
        self.state.borrow().vertex_arrays.get(&vertex_array).cloned()
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.state.borrow().textures.get(&texture).copied()
    }

    pub fn renderbuffer_desc(&self, renderbuffer: RenderbufferId) -> Option<RenderbufferDesc> {
        self.state.borrow().renderbuffers.get(&renderbuffer).copied()
    }

    pub fn framebuffer_desc(&self, framebuffer: FramebufferId) -> Option<FramebufferDesc> {
        self.state.borrow().framebuffers.get(&framebuffer).cloned()
    }

    /// Current solid colour of an image.
    pub fn color_of(&self, attachment: Attachment) -> Option<[f32; 4]> {
        self.state.borrow().content.get(&attachment).copied()
    }

    /// Current solid colour of the default framebuffer.
    pub fn screen_color(&self) -> [f32; 4] {
        self.state.borrow().screen
    }

    /// Overwrite an image's colour, standing in for rendering into it.
    pub fn fill(&self, attachment: Attachment, color: [f32; 4]) {
        self.state.borrow_mut().content.insert(attachment, color);
    }

    /// Last value set for a loose uniform.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .and_then(|record| record.loose.get(name).copied())
    }

    pub fn bound_uniform_buffer(&self, program: ProgramId, index: u32) -> Option<BufferId> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .and_then(|record| record.bound_blocks.get(&index).copied())
    }
}

impl Gpu for TrackingGpu {
    fn limits(&self) -> GpuLimits {
        self.state.borrow().limits
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        contents: Option<&[u8]>,
    ) -> Result<BufferId, GpuError> {
        let mut state = self.state.borrow_mut();
        let data = match contents {
            Some(bytes) if bytes.len() as u64 != desc.size => {
                return Err(GpuError::InvalidArgument(format!(
                    "buffer of {} bytes given {} bytes of contents",
                    desc.size,
                    bytes.len()
                )));
            }
            Some(bytes) => bytes.to_vec(),
            None => vec![0; desc.size as usize],
        };
        let id: BufferId = state.allocate()?;
        state.buffers.insert(id, BufferRecord { desc: *desc, data });
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.require(buffer)?;
        let record = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| GpuError::unknown(buffer))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > record.data.len() {
            return Err(GpuError::InvalidArgument(format!(
                "write of {} bytes at {} overflows buffer of {} bytes",
                data.len(),
                offset,
                record.data.len()
            )));
        }
        record.data[start..end].copy_from_slice(data);
        state.events.push(GpuEvent::BufferWrite {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(buffer)?;
        state.buffers.remove(&buffer);
        Ok(())
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayId, GpuError> {
        let mut state = self.state.borrow_mut();
        state.require(desc.vertex_buffer)?;
        if let Some(index_buffer) = desc.index_buffer {
            state.require(index_buffer)?;
        }
        let id: VertexArrayId = state.allocate()?;
        state.vertex_arrays.insert(id, desc.clone());
        Ok(id)
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(vertex_array)?;
        state.vertex_arrays.remove(&vertex_array);
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<TextureId, GpuError> {
        let mut state = self.state.borrow_mut();
        let max = state.limits.max_texture_size;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(GpuError::TextureTooLarge {
                width: desc.width,
                height: desc.height,
                max,
            });
        }
        let expected = (desc.width * desc.height) as usize * desc.format.pixel_size();
        if let Some(pixels) = pixels {
            if pixels.len() != expected {
                return Err(GpuError::InvalidArgument(format!(
                    "expected {} bytes of pixels, got {}",
                    expected,
                    pixels.len()
                )));
            }
        }
        let id: TextureId = state.allocate()?;
        state.textures.insert(id, *desc);
        let color = match (pixels, desc.format) {
            (Some(p), TextureFormat::Rgb8) => {
                [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0, 1.0]
            }
            (Some(p), TextureFormat::Rgba8) => [
                p[0] as f32 / 255.0,
                p[1] as f32 / 255.0,
                p[2] as f32 / 255.0,
                p[3] as f32 / 255.0,
            ],
            _ => [0.0; 4],
        };
        state.content.insert(Attachment::Texture(id), color);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(texture)?;
        state.textures.remove(&texture);
        state.content.remove(&Attachment::Texture(texture));
        Ok(())
    }

    fn create_renderbuffer(&mut self, desc: &RenderbufferDesc) -> Result<RenderbufferId, GpuError> {
        let mut state = self.state.borrow_mut();
        let limits = state.limits;
        if desc.samples == 0 || desc.samples > limits.max_samples {
            return Err(GpuError::UnsupportedSamples {
                requested: desc.samples,
                max: limits.max_samples,
            });
        }
        if desc.width == 0
            || desc.height == 0
            || desc.width > limits.max_texture_size
            || desc.height > limits.max_texture_size
        {
            return Err(GpuError::TextureTooLarge {
                width: desc.width,
                height: desc.height,
                max: limits.max_texture_size,
            });
        }
        let id: RenderbufferId = state.allocate()?;
        state.renderbuffers.insert(id, *desc);
        state.content.insert(Attachment::Renderbuffer(id), [0.0; 4]);
        Ok(id)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(renderbuffer)?;
        state.renderbuffers.remove(&renderbuffer);
        state.content.remove(&Attachment::Renderbuffer(renderbuffer));
        Ok(())
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId, GpuError> {
        let mut state = self.state.borrow_mut();
        let limits = state.limits;
        validate_framebuffer(desc, &limits, |a| state.describe(a))?;
        let id: FramebufferId = state.allocate()?;
        state.framebuffers.insert(id, desc.clone());
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(framebuffer)?;
        state.framebuffers.remove(&framebuffer);
        if state.bound == Some(framebuffer) {
            state.bound = None;
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        match framebuffer {
            Some(fb) => state.require(fb)?,
            None if !state.has_screen => return Err(GpuError::NoDefaultFramebuffer),
            None => {}
        }
        state.bound = framebuffer;
        state.events.push(GpuEvent::BindFramebuffer(framebuffer));
        Ok(())
    }

    fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.state.borrow().bound
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.state.borrow_mut().viewport = viewport;
    }

    fn viewport(&self) -> Rect {
        self.state.borrow().viewport
    }

    fn set_render_state(&mut self, render_state: RenderState) {
        let mut state = self.state.borrow_mut();
        state.state = render_state;
        state.events.push(GpuEvent::SetRenderState(render_state));
    }

    fn render_state(&self) -> RenderState {
        self.state.borrow().state
    }

    fn clear(&mut self, color: [f32; 4], _depth: f32) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let framebuffer = state.bound;
        state.write_color(framebuffer, color);
        state.events.push(GpuEvent::Clear { framebuffer, color });
        Ok(())
    }

    fn blit_framebuffer(&mut self, desc: &BlitDesc) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let src = state
            .framebuffers
            .get(&desc.src)
            .cloned()
            .ok_or_else(|| GpuError::unknown(desc.src))?;
        let attachment = src
            .color
            .get(desc.src_attachment as usize)
            .copied()
            .ok_or_else(|| {
                GpuError::InvalidArgument(format!(
                    "source has {} color attachments, asked for {}",
                    src.color.len(),
                    desc.src_attachment
                ))
            })?;
        match desc.dst {
            Some(dst) => state.require(dst)?,
            None if !state.has_screen => return Err(GpuError::NoDefaultFramebuffer),
            None => {}
        }
        let color = state.content.get(&attachment).copied().unwrap_or([0.0; 4]);
        state.write_color(desc.dst, color);
        state.events.push(GpuEvent::Blit(*desc));
        Ok(())
    }

    fn create_program(&mut self, name: &str, source: &str) -> Result<ProgramId, GpuError> {
        let info = ProgramInfo::from_wgsl(name, source)?;
        let mut state = self.state.borrow_mut();
        let id: ProgramId = state.allocate()?;
        state.programs.insert(
            id,
            ProgramRecord {
                info: Rc::new(info),
                bound_blocks: HashMap::new(),
                loose: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.release(program)?;
        state.programs.remove(&program);
        Ok(())
    }

    fn program_info(&self, program: ProgramId) -> Result<Rc<ProgramInfo>, GpuError> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|record| record.info.clone())
            .ok_or_else(|| GpuError::unknown(program))
    }

    fn bind_uniform_block(
        &mut self,
        program: ProgramId,
        index: u32,
        buffer: BufferId,
    ) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        state.require(buffer)?;
        let record = state
            .programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::unknown(program))?;
        if index as usize >= record.info.blocks.len() {
            return Err(GpuError::InvalidArgument(format!(
                "program '{}' has no uniform block {}",
                record.info.name, index
            )));
        }
        record.bound_blocks.insert(index, buffer);
        Ok(())
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let record = state
            .programs
            .get_mut(&program)
            .ok_or_else(|| GpuError::unknown(program))?;
        if record.info.find_uniform(name).is_none() {
            return Err(GpuError::UnknownUniform(name.to_string()));
        }
        record.loose.insert(name.to_string(), value);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let info = state
            .programs
            .get(&call.program)
            .map(|record| record.info.clone())
            .ok_or_else(|| GpuError::unknown(call.program))?;
        let vertex_array = state
            .vertex_arrays
            .get(&call.vertex_array)
            .cloned()
            .ok_or_else(|| GpuError::unknown(call.vertex_array))?;

        if let DrawRange::Indexed { byte_offset, count } = call.range {
            let index_buffer = vertex_array.index_buffer.ok_or_else(|| {
                GpuError::InvalidArgument("indexed draw without an index buffer".into())
            })?;
            let available = state
                .buffers
                .get(&index_buffer)
                .map_or(0, |record| record.data.len() as u64);
            if byte_offset + count as u64 * 4 > available {
                return Err(GpuError::InvalidArgument(format!(
                    "{count} indices at byte {byte_offset} overrun the index buffer"
                )));
            }
        }

        if call.textures.len() < info.textures.len() {
            return Err(GpuError::InvalidArgument(format!(
                "program '{}' samples {} textures, {} bound",
                info.name,
                info.textures.len(),
                call.textures.len()
            )));
        }
        let sampled = &call.textures[..info.textures.len()];
        for texture in sampled {
            state.require(*texture)?;
        }

        let attached = state.bound_color();
        let depth = state
            .bound
            .and_then(|fb| state.framebuffers.get(&fb))
            .and_then(|desc| desc.depth);
        for texture in sampled {
            let attachment = Attachment::Texture(*texture);
            if attached.contains(&attachment) || depth == Some(attachment) {
                state.violations.push(format!(
                    "feedback loop: {texture} sampled while attached to the bound framebuffer"
                ));
            }
        }

        let color = sampled
            .first()
            .and_then(|t| state.content.get(&Attachment::Texture(*t)).copied())
            .unwrap_or(WHITE);
        let framebuffer = state.bound;
        state.write_color(framebuffer, color);

        let event = GpuEvent::Draw {
            framebuffer,
            program: call.program,
            primitive: call.primitive,
            range: call.range,
            textures: sampled.to_vec(),
            state: state.state,
            viewport: state.viewport,
        };
        state.events.push(event);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture_desc(width: u32, height: u32, format: TextureFormat) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format,
            filter: Filter::Linear,
            wrap: Wrap::ClampToEdge,
        }
    }

    #[test]
    fn test_double_release_is_a_violation() {
        let mut gpu = TrackingGpu::new();
        let texture = gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .unwrap();
        gpu.delete_texture(texture).unwrap();
        assert!(gpu.delete_texture(texture).is_err());
        assert_eq!(gpu.violations().len(), 1);
    }

    #[test]
    fn test_fail_next_allocation() {
        let mut gpu = TrackingGpu::new();
        gpu.fail_next(ResourceKind::Texture);
        assert!(gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .is_err());
        assert!(gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .is_ok());
        assert_eq!(gpu.created_count(ResourceKind::Texture), 1);
    }

    #[test]
    fn test_framebuffer_rejects_mismatched_sizes() {
        let mut gpu = TrackingGpu::new();
        let color = gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .unwrap();
        let depth = gpu
            .create_texture(&texture_desc(8, 8, TextureFormat::Depth32), None)
            .unwrap();
        let result = gpu.create_framebuffer(&FramebufferDesc {
            color: vec![Attachment::Texture(color)],
            depth: Some(Attachment::Texture(depth)),
        });
        assert!(matches!(result, Err(GpuError::FramebufferIncomplete(_))));
    }

    #[test]
    fn test_blit_copies_attachment_color() {
        let mut gpu = TrackingGpu::new();
        let a = gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .unwrap();
        let b = gpu
            .create_texture(&texture_desc(4, 4, TextureFormat::Rgba8), None)
            .unwrap();
        let fb = gpu
            .create_framebuffer(&FramebufferDesc {
                color: vec![Attachment::Texture(a), Attachment::Texture(b)],
                depth: None,
            })
            .unwrap();
        gpu.fill(Attachment::Texture(b), [0.0, 1.0, 0.0, 1.0]);
        gpu.blit_framebuffer(&BlitDesc {
            src: fb,
            src_attachment: 1,
            src_rect: Rect::from_size(4, 4),
            dst: None,
            dst_rect: Rect::from_size(4, 4),
            filter: Filter::Linear,
        })
        .unwrap();
        assert_eq!(gpu.screen_color(), [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rgb_upload_sets_content() {
        let mut gpu = TrackingGpu::new();
        let texture = gpu
            .create_texture(
                &texture_desc(1, 1, TextureFormat::Rgb8),
                Some(&[255, 0, 255]),
            )
            .unwrap();
        assert_eq!(
            gpu.color_of(Attachment::Texture(texture)),
            Some([1.0, 0.0, 1.0, 1.0])
        );
    }
}
