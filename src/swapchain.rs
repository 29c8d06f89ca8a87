use std::rc::Rc;

use ash::{
    extensions::khr::Swapchain,
    vk::{
        ColorSpaceKHR, CompositeAlphaFlagsKHR, Extent2D, Format, Handle, Image, ImageUsageFlags,
        PhysicalDevice, PresentModeKHR, SharingMode, SurfaceCapabilitiesKHR, SurfaceFormatKHR,
        SwapchainCreateInfoKHR, SwapchainKHR,
    },
};
use tracing::{debug, info};

use crate::{
    error::{InitError, Result},
    ledger::ResourceKind,
    logical_device::LogicalDeviceGuard,
    physical_device::QueueFamilies,
    surface::SurfaceGuard,
};

/// Details about what the surface supports for a given physical device.
/// Queried once during device selection and reused to build the swapchain.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    pub capabilities: SurfaceCapabilitiesKHR,
    /// The formats (color depth settings) available to use.
    pub formats: Vec<SurfaceFormatKHR>,
    pub present_modes: Vec<PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(surface: &SurfaceGuard, device: PhysicalDevice) -> Result<Self> {
        Ok(Self {
            capabilities: surface.get_capabilities(device)?,
            formats: surface.get_surface_formats(device)?,
            present_modes: surface.get_presentation_modes(device)?,
        })
    }

    /// A swapchain can only be built with at least one format and one mode
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Prefers 8 bit BGRA in the sRGB color space, otherwise takes whatever
    /// the surface lists first.
    pub fn choose_surface_format(&self) -> Option<SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|format| {
                format.format == Format::B8G8R8A8_SRGB
                    && format.color_space == ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| self.formats.first())
            .copied()
    }

    pub fn choose_present_mode(&self) -> PresentModeKHR {
        // prefer mailbox, where if we can render faster than the screen can present
        // and the queue fills up, we'll replace the last image with the most up to
        // date version
        if self.present_modes.contains(&PresentModeKHR::MAILBOX) {
            return PresentModeKHR::MAILBOX;
        }
        // FIFO is the only mode every implementation has to support
        PresentModeKHR::FIFO
    }

    /// The resolution of the swapchain images in pixels. Most platforms fix it
    /// to the window size; a width of `u32::MAX` means we get to pick, so the
    /// framebuffer size is clamped into the supported range.
    pub fn choose_extent(&self, framebuffer_size: (i32, i32)) -> Extent2D {
        let capabilities = &self.capabilities;
        if capabilities.current_extent.width != u32::MAX {
            return capabilities.current_extent;
        }
        let (width, height) = framebuffer_size;
        Extent2D {
            width: u32::try_from(width).unwrap_or(0).clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: u32::try_from(height).unwrap_or(0).clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }

    /// One more than the minimum, so we never wait on the driver. A maximum of
    /// zero means there is no upper bound.
    pub fn image_count(&self) -> u32 {
        let image_count = self.capabilities.min_image_count + 1;
        match self.capabilities.max_image_count {
            0 => image_count,
            max_image_count => image_count.min(max_image_count),
        }
    }
}

/// How swapchain images are shared between the graphics and present queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// Both queues come from one family, images are owned by it
    Exclusive,
    /// Separate families, listed as `[graphics, present]`
    Concurrent([u32; 2]),
}

impl ImageSharing {
    pub fn for_families(queue_families: &QueueFamilies) -> Self {
        if queue_families.graphics == queue_families.present {
            ImageSharing::Exclusive
        } else {
            ImageSharing::Concurrent([queue_families.graphics, queue_families.present])
        }
    }

    pub fn mode(&self) -> SharingMode {
        match self {
            ImageSharing::Exclusive => SharingMode::EXCLUSIVE,
            ImageSharing::Concurrent(_) => SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            ImageSharing::Exclusive => &[],
            ImageSharing::Concurrent(indices) => indices,
        }
    }
}

/// RAII for the swapchain. Keeps the images it hands out along with the
/// format and extent later stages build against.
pub struct SwapchainGuard {
    swapchain_fn: Swapchain,
    handle: SwapchainKHR,
    images: Vec<Image>,
    surface_format: SurfaceFormatKHR,
    present_mode: PresentModeKHR,
    extent: Extent2D,
    logical_device: Rc<LogicalDeviceGuard>,
    // the surface has to outlive the swapchain presenting to it
    _surface: Rc<SurfaceGuard>,
}

impl SwapchainGuard {
    pub fn try_new(
        logical_device: &Rc<LogicalDeviceGuard>,
        surface: &Rc<SurfaceGuard>,
        support: &SwapchainSupportDetails,
        framebuffer_size: (i32, i32),
    ) -> Result<Rc<Self>> {
        let surface_format = support.choose_surface_format().ok_or_else(|| {
            InitError::UnsupportedFeature("a presentable surface format".to_owned())
        })?;
        let present_mode = support.choose_present_mode();
        let extent = support.choose_extent(framebuffer_size);
        let image_count = support.image_count();
        let sharing = ImageSharing::for_families(logical_device.queue_families());
        debug!(
            "Swapchain request: {:?}/{:?}, {:?}, {}x{}, {} images, {:?}",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            extent.width,
            extent.height,
            image_count,
            sharing
        );

        let mut create_info = SwapchainCreateInfoKHR::builder()
            .surface(***surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            // not doing sterioscopic processing, only need 1 layer
            .image_array_layers(1)
            // we're rendering images, so set usage as a color attachment
            .image_usage(ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode())
            // no extra transforms - just pass in current transform
            .pre_transform(support.capabilities.current_transform)
            // ignore alpha channel
            .composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            // discard pixels hidden by other windows
            .clipped(true)
            .old_swapchain(SwapchainKHR::null());
        if let ImageSharing::Concurrent(_) = sharing {
            create_info = create_info.queue_family_indices(sharing.queue_family_indices());
        }

        let swapchain_fn = Swapchain::new(logical_device.instance(), logical_device);
        let handle = unsafe { swapchain_fn.create_swapchain(&create_info, None) }
            .map_err(InitError::failed("create swapchain"))?;
        logical_device
            .ledger()
            .created(ResourceKind::Swapchain, handle.as_raw());

        // the driver may hand back more images than we asked for
        let images = match unsafe { swapchain_fn.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(err) => {
                logical_device
                    .ledger()
                    .released(ResourceKind::Swapchain, handle.as_raw());
                unsafe { swapchain_fn.destroy_swapchain(handle, None) };
                return Err(InitError::failed("get swapchain images")(err));
            }
        };
        info!(
            "Swapchain created with {} images at {}x{}",
            images.len(),
            extent.width,
            extent.height
        );

        Ok(Rc::new(Self {
            swapchain_fn,
            handle,
            images,
            surface_format,
            present_mode,
            extent,
            logical_device: Rc::clone(logical_device),
            _surface: Rc::clone(surface),
        }))
    }

    pub fn handle(&self) -> SwapchainKHR {
        self.handle
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn surface_format(&self) -> SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for SwapchainGuard {
    fn drop(&mut self) {
        self.logical_device
            .ledger()
            .released(ResourceKind::Swapchain, self.handle.as_raw());
        unsafe { self.swapchain_fn.destroy_swapchain(self.handle, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: Format, color_space: ColorSpaceKHR) -> SurfaceFormatKHR {
        SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn with_formats(formats: Vec<SurfaceFormatKHR>) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            formats,
            ..Default::default()
        }
    }

    fn with_present_modes(present_modes: Vec<PresentModeKHR>) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            present_modes,
            ..Default::default()
        }
    }

    fn with_image_counts(min_image_count: u32, max_image_count: u32) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: SurfaceCapabilitiesKHR {
                min_image_count,
                max_image_count,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn with_extents(current: Extent2D, min: Extent2D, max: Extent2D) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: SurfaceCapabilitiesKHR {
                current_extent: current,
                min_image_extent: min,
                max_image_extent: max,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> Extent2D {
        Extent2D { width, height }
    }

    #[test]
    fn prefers_bgra_srgb() {
        let preferred = format(Format::B8G8R8A8_SRGB, ColorSpaceKHR::SRGB_NONLINEAR);
        let support = with_formats(vec![
            format(Format::R8G8B8A8_UNORM, ColorSpaceKHR::SRGB_NONLINEAR),
            format(Format::B8G8R8A8_SRGB, ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            preferred,
        ]);
        assert_eq!(support.choose_surface_format(), Some(preferred));
    }

    #[test]
    fn falls_back_to_first_format() {
        let first = format(Format::R16G16B16A16_SFLOAT, ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        let support = with_formats(vec![
            first,
            format(Format::B8G8R8A8_UNORM, ColorSpaceKHR::SRGB_NONLINEAR),
        ]);
        assert_eq!(support.choose_surface_format(), Some(first));
    }

    #[test]
    fn no_formats_no_choice() {
        assert_eq!(with_formats(vec![]).choose_surface_format(), None);
        assert!(!with_formats(vec![]).is_adequate());
    }

    #[test]
    fn prefers_mailbox() {
        let support = with_present_modes(vec![
            PresentModeKHR::IMMEDIATE,
            PresentModeKHR::FIFO,
            PresentModeKHR::MAILBOX,
        ]);
        assert_eq!(support.choose_present_mode(), PresentModeKHR::MAILBOX);
    }

    #[test]
    fn falls_back_to_fifo_even_when_unlisted() {
        let support = with_present_modes(vec![PresentModeKHR::IMMEDIATE]);
        assert_eq!(support.choose_present_mode(), PresentModeKHR::FIFO);
        assert_eq!(
            with_present_modes(vec![]).choose_present_mode(),
            PresentModeKHR::FIFO
        );
    }

    #[test]
    fn fixed_extent_used_verbatim() {
        let support = with_extents(extent(1024, 768), extent(1, 1), extent(640, 480));
        assert_eq!(support.choose_extent((800, 600)), extent(1024, 768));
    }

    #[test]
    fn unbounded_extent_uses_framebuffer_size() {
        let support = with_extents(
            extent(u32::MAX, u32::MAX),
            extent(1, 1),
            extent(4096, 4096),
        );
        assert_eq!(support.choose_extent((800, 600)), extent(800, 600));
    }

    #[test]
    fn unbounded_extent_is_clamped_per_component() {
        let support = with_extents(
            extent(u32::MAX, u32::MAX),
            extent(200, 700),
            extent(640, 1000),
        );
        assert_eq!(support.choose_extent((800, 600)), extent(640, 700));
        assert_eq!(support.choose_extent((-5, 2000)), extent(200, 1000));
    }

    #[test]
    fn image_count_unbounded_max() {
        assert_eq!(with_image_counts(2, 0).image_count(), 3);
    }

    #[test]
    fn image_count_clamped_to_max() {
        assert_eq!(with_image_counts(2, 2).image_count(), 2);
        assert_eq!(with_image_counts(2, 8).image_count(), 3);
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let sharing = ImageSharing::for_families(&QueueFamilies {
            graphics: 0,
            present: 2,
        });
        assert_eq!(sharing, ImageSharing::Concurrent([0, 2]));
        assert_eq!(sharing.mode(), SharingMode::CONCURRENT);
        assert_eq!(sharing.queue_family_indices(), &[0, 2]);
    }

    #[test]
    fn same_family_is_exclusive() {
        let sharing = ImageSharing::for_families(&QueueFamilies {
            graphics: 1,
            present: 1,
        });
        assert_eq!(sharing, ImageSharing::Exclusive);
        assert_eq!(sharing.mode(), SharingMode::EXCLUSIVE);
        assert!(sharing.queue_family_indices().is_empty());
    }
}
