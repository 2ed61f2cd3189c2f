/// Screens of the [`Wizard`](super::Wizard).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Load or ask for connection settings and connect to Portainer.
    Connect,
    SelectEndpoint,
    SelectContainer,
    /// Inspect the container and ask for conversion options.
    Configure,
    /// Show the manifest and save or copy it.
    Preview,
    Exit,
}

/// Outcome of a [`State`], used to pick the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Connected with saved settings which include an endpoint.
    Connected,
    /// Connected, but no endpoint is selected yet.
    EndpointRequired,
    EndpointSelected,
    ContainerSelected,
    Generated,
    Back,
    /// Run the same state again after a failure.
    Retry,
    Quit,
}

impl State {
    /// The state to move to after `event` occurs in this state.
    ///
    /// Events which do not apply to the state leave it unchanged.
    pub const fn next(self, event: Event) -> Self {
        match (self, event) {
            (_, Event::Quit) | (Self::Connect, Event::Back) => Self::Exit,
            (Self::Connect, Event::EndpointRequired) | (Self::SelectContainer, Event::Back) => {
                Self::SelectEndpoint
            }
            (Self::Connect, Event::Connected)
            | (Self::SelectEndpoint, Event::EndpointSelected)
            | (Self::Configure, Event::Back) => Self::SelectContainer,
            (Self::SelectEndpoint, Event::Back) => Self::Connect,
            (Self::SelectContainer, Event::ContainerSelected) | (Self::Preview, Event::Back) => {
                Self::Configure
            }
            (Self::Configure, Event::Generated) => Self::Preview,
            (state, _) => state,
        }
    }
}
