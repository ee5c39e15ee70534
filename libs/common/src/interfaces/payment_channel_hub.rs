use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    interface IPaymentChannelHub {
        function openChannel(address receiver, address token, uint256 deposit, bytes32 channelRef) external;

        function commitPayment(bytes32 channelRef, uint256 amount, bytes signature) external;

        function closeChannel(bytes32 channelRef) external;
    }
}

sol! {
    #[derive(Debug)]
    event ChannelOpened(bytes32 indexed channelRef, address indexed sender, address indexed receiver, uint256 deposit);

    #[derive(Debug)]
    event PaymentCommitted(bytes32 indexed channelRef, uint256 amount);

    #[derive(Debug)]
    event ChannelClosed(bytes32 indexed channelRef, uint256 settled);
}
