//! Live window capture using the Windows Graphics Capture API.
//!
//! The frame pool is free-threaded: its FrameArrived handler only bumps a
//! counter, and the pixels are read back (D3D11 staging copy, BGRA -> RGBA,
//! cropped to the client area) on the caller's thread when the detector asks
//! for the latest frame.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Graphics::SizeInt32;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use super::window::{find_window_by_process, get_client_area_info};
use super::{CaptureBackend, CaptureError, FrameSource};

const PIXEL_FORMAT: DirectXPixelFormat = DirectXPixelFormat::B8G8R8A8UIntNormalized;
const BUFFER_COUNT: i32 = 2;

/// Captures the main window of a process, found by executable name.
pub struct WindowCaptureBackend {
    process_name: String,
}

impl WindowCaptureBackend {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
        }
    }
}

impl CaptureBackend for WindowCaptureBackend {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if !GraphicsCaptureSession::IsSupported().unwrap_or(false) {
            return Err(CaptureError::Unsupported(
                "Windows Graphics Capture is not available on this system".to_string(),
            ));
        }

        let hwnd = find_window_by_process(&self.process_name)
            .map_err(|e| CaptureError::Denied(e.to_string()))?;
        log::info!("Window handle: {:?}", hwnd);

        let source = WindowCaptureSource::start(hwnd)
            .map_err(|e| CaptureError::Denied(format!("{:#}", e)))?;
        Ok(Box::new(source))
    }
}

struct WindowCaptureSource {
    hwnd: HWND,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    d3d_device: IDirect3DDevice,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    pool_size: SizeInt32,
    staging: Option<(ID3D11Texture2D, u32, u32)>,
    arrived: Arc<AtomicU64>,
    ended: Arc<AtomicBool>,
    latest: Option<RgbaImage>,
    stopped: bool,
}

impl WindowCaptureSource {
    fn start(hwnd: HWND) -> Result<Self> {
        let (device, context) = create_d3d11_device()?;
        let item = create_capture_item(hwnd)?;
        let size = item.Size()?;
        log::info!("Capture size: {}x{}", size.Width, size.Height);

        let d3d_device = create_direct3d_device(&device)?;
        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &d3d_device,
            PIXEL_FORMAT,
            BUFFER_COUNT,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        let arrived = Arc::new(AtomicU64::new(0));
        let arrived_clone = arrived.clone();
        frame_pool.FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                arrived_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        let ended = Arc::new(AtomicBool::new(false));
        let ended_clone = ended.clone();
        item.Closed(&TypedEventHandler::new(
            move |_item: &Option<GraphicsCaptureItem>, _| {
                ended_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        session.StartCapture()?;
        log::info!("Capture session started");

        Ok(Self {
            hwnd,
            device,
            context,
            d3d_device,
            frame_pool,
            session,
            pool_size: size,
            staging: None,
            arrived,
            ended,
            latest: None,
            stopped: false,
        })
    }

    /// Drains the pool and keeps only the newest frame.
    fn newest_frame(&self) -> Option<Direct3D11CaptureFrame> {
        let mut newest = None;
        while let Ok(frame) = self.frame_pool.TryGetNextFrame() {
            newest = Some(frame);
        }
        newest
    }

    fn read_back(&mut self, frame: &Direct3D11CaptureFrame) -> Result<RgbaImage> {
        let content = frame.ContentSize()?;
        if content.Width != self.pool_size.Width || content.Height != self.pool_size.Height {
            log::info!("Window resized to {}x{}", content.Width, content.Height);
            self.frame_pool
                .Recreate(&self.d3d_device, PIXEL_FORMAT, BUFFER_COUNT, content)?;
            self.pool_size = content;
        }

        let surface = frame.Surface()?;
        let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };
        let staging = self.staging_texture(&desc)?;

        unsafe {
            self.context.CopyResource(
                &staging.cast::<ID3D11Resource>()?,
                &texture.cast::<ID3D11Resource>()?,
            );
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            self.context.Map(
                &staging.cast::<ID3D11Resource>()?,
                0,
                D3D11_MAP_READ,
                0,
                Some(&mut mapped),
            )?;
            mapped
        };

        // Crop to the client area (excluding title bar and borders)
        let (crop_x, crop_y, crop_width, crop_height) = match get_client_area_info(self.hwnd) {
            Ok((client, offset)) => (
                offset.x.max(0) as u32,
                offset.y.max(0) as u32,
                (client.right - client.left).max(0) as u32,
                (client.bottom - client.top).max(0) as u32,
            ),
            Err(_) => (0, 0, desc.Width, desc.Height),
        };
        let crop_width = crop_width.min(desc.Width.saturating_sub(crop_x));
        let crop_height = crop_height.min(desc.Height.saturating_sub(crop_y));

        let src_data = unsafe {
            std::slice::from_raw_parts(
                mapped.pData as *const u8,
                (mapped.RowPitch * desc.Height) as usize,
            )
        };
        let row_pitch = mapped.RowPitch as usize;

        let img: RgbaImage = ImageBuffer::from_fn(crop_width, crop_height, |x, y| {
            let offset = (crop_y + y) as usize * row_pitch + (crop_x + x) as usize * 4;
            // BGRA -> RGBA
            Rgba([
                src_data[offset + 2],
                src_data[offset + 1],
                src_data[offset],
                src_data[offset + 3],
            ])
        });

        unsafe {
            self.context.Unmap(&staging.cast::<ID3D11Resource>()?, 0);
        }

        Ok(img)
    }

    /// Staging texture matching `desc`, reused until the frame size changes.
    fn staging_texture(&mut self, desc: &D3D11_TEXTURE2D_DESC) -> Result<ID3D11Texture2D> {
        if let Some((texture, w, h)) = &self.staging {
            if *w == desc.Width && *h == desc.Height {
                return Ok(texture.clone());
            }
        }

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };
        let texture = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| anyhow!("Failed to create staging texture"))?
        };
        self.staging = Some((texture.clone(), desc.Width, desc.Height));
        Ok(texture)
    }
}

impl FrameSource for WindowCaptureSource {
    fn frame_counter(&self) -> Option<u64> {
        Some(self.arrived.load(Ordering::SeqCst))
    }

    fn latest_frame(&mut self) -> Option<&RgbaImage> {
        if !self.stopped {
            if let Some(frame) = self.newest_frame() {
                match self.read_back(&frame) {
                    Ok(img) => self.latest = Some(img),
                    Err(e) => log::warn!("Frame read-back failed: {:#}", e),
                }
            }
        }
        self.latest.as_ref()
    }

    fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = self.session.Close();
        let _ = self.frame_pool.Close();
        self.latest = None;
        self.staging = None;
    }
}

impl Drop for WindowCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Creates a Direct3D 11 device and immediate context.
fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| anyhow!("Failed to create D3D11 device"))?,
        context.ok_or_else(|| anyhow!("Failed to create D3D11 context"))?,
    ))
}

/// Wraps a D3D11 device in the WinRT interface the capture API expects.
fn create_direct3d_device(device: &ID3D11Device) -> Result<IDirect3DDevice> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    inspectable
        .cast()
        .context("Failed to cast to IDirect3DDevice")
}

fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe {
        windows::Win32::System::WinRT::RoGetActivationFactory(class_name)
            .context("Failed to get IGraphicsCaptureItemInterop")?
    };
    unsafe {
        interop
            .CreateForWindow(hwnd)
            .context("Failed to create capture item for window")
    }
}
